//! Command handlers.
//!
//! | File          | Invocation          | Description                        |
//! |---------------|---------------------|------------------------------------|
//! | `run.rs`      | `saver [TASK]`      | Run one or all backup tasks        |
//! | `list.rs`     | `saver --list`      | Show discovered task definitions   |

pub mod list;
pub mod run;
