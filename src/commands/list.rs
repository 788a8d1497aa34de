//! `saver --list` — show what a batch run would pick up.
//!
//! Needs neither root nor the uploader, so it is safe to run while writing
//! new task files.

use anyhow::Result;
use console::style;

use crate::{
    config::Config,
    discovery::{Discovered, Selection, discover},
};

pub fn run(cfg: &Config) -> Result<()> {
    let found = discover(&Selection::All, &cfg.paths.tasks_dir)?;

    println!();
    println!(
        "  {} {}",
        style("Tasks in").dim(),
        style(cfg.paths.tasks_dir.display()).bold()
    );
    println!();

    if found.is_empty() {
        println!("  {}", style("(none)").dim());
    }
    for item in &found {
        println!("  {}", describe(item));
    }
    println!();
    Ok(())
}

/// One line per task file.
pub fn describe(item: &Discovered) -> String {
    let file = item
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match &item.definition {
        Ok(def) => {
            let state = if def.enabled { "enabled" } else { "disabled" };
            let mut hooks = Vec::new();
            if def.exec_before.is_some() {
                hooks.push("before");
            }
            if def.exec_after.is_some() {
                hooks.push("after");
            }
            let hooks = if hooks.is_empty() {
                String::new()
            } else {
                format!(", hooks: {}", hooks.join("+"))
            };
            format!(
                "{file}: {} [{state}] {} path(s){hooks}",
                def.name,
                def.paths.len()
            )
        },
        Err(e) => format!("{file}: invalid ({e})"),
    }
}
