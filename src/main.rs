//! `saver` — encrypted tar backups of task-defined paths, uploaded to Dropbox.
//!
//! # Overview
//!
//! Each `*.txt` file in the tasks directory describes one backup job: a name,
//! a passphrase, and a list of paths.  For every enabled job `saver` writes a
//! manifest, pipes `tar` into `gpg --symmetric`, uploads the result with
//! `dropbox_uploader.sh`, and removes the local files again.  Optional shell
//! hooks run before and after.
//!
//! # Usage
//!
//! ```text
//! saver                  # run every task in the tasks directory
//! saver Nightly          # run only tasks/Nightly.txt
//! saver --list           # show the task definitions that were found
//! saver --print-config   # show resolved settings without running anything
//! saver --strict         # treat non-zero hook/tool exits as task failures
//! ```
//!
//! # Module layout
//!
//! | Module                   | Responsibility                              |
//! |--------------------------|---------------------------------------------|
//! | [`cli`]                  | Argument types parsed by clap               |
//! | [`config`]               | `Config` struct + layered TOML loader       |
//! | [`host`]                 | Hostname and effective uid                  |
//! | [`task`]                 | Task file parser and validation             |
//! | [`discovery`]            | Batch / single-task file resolution         |
//! | [`pipeline`]             | Per-task stages and artifact naming         |
//! | [`runner`]               | Argument construction helpers               |
//! | [`tools`]                | Archiver / uploader / hook collaborators    |
//! | [`ui`]                   | Spinner, captured execution, stage output   |
//! | [`commands::run`]        | Default command: run tasks                  |
//! | [`commands::list`]       | `--list`                                    |

mod cli;
mod commands;
mod config;
mod discovery;
mod host;
mod pipeline;
mod runner;
mod task;
mod tools;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::{PartialConfig, parse_partial};
use host::Host;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_merged_config(&cli)?;

    if cli.print_config {
        println!("{cfg:#?}");
        return Ok(());
    }

    if cli.list {
        return commands::list::run(&cfg);
    }

    let host = Host::detect(&cfg)?;
    commands::run::run(&cli, &cfg, &host)
}

/// Load settings from two sources and merge them.
///
/// 1. `~/.config/saver/config.toml` — machine-wide defaults
/// 2. `--config` (default: `./saver.toml`) — overrides
///
/// Later values win on a per-field basis.  Either file may be absent, but a
/// file that exists must parse.  The
/// `--strict` flag is folded in last, so the result never changes afterwards.
fn load_merged_config(cli: &Cli) -> Result<config::Config> {
    let global_path = dirs_next::config_dir().map(|d| d.join("saver").join("config.toml"));

    let global: PartialConfig = match global_path.as_deref() {
        Some(p) => parse_partial(p)?.unwrap_or_default(),
        None => PartialConfig::default(),
    };

    let local: PartialConfig = if let Some(p) = parse_partial(&cli.config)? {
        p
    } else {
        eprintln!(
            "Warning: settings file '{}' not found, using defaults.",
            cli.config.display()
        );
        PartialConfig::default()
    };

    let flags = PartialConfig {
        strict: cli.strict.then_some(true),
        ..PartialConfig::default()
    };

    Ok(global.merge(local).merge(flags).resolve())
}
