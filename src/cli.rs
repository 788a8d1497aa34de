//! Command-line interface definition.
//!
//! All argument parsing lives here so the rest of the codebase can stay
//! agnostic to `clap`.  The `Cli` struct is parsed once in `main` and then
//! passed (by reference) into the command handlers.

use std::path::PathBuf;

use clap::Parser;

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name    = "saver",
    about   = "Encrypted tar backups of task-defined paths, uploaded to Dropbox",
    version,
    // Show a compact two-column help layout.
    help_template = "\
{before-help}{name} {version}
{about}

{usage-heading} {usage}

{all-args}{after-help}"
)]
pub struct Cli {
    /// Run only the task defined in `<tasks_dir>/<TASK>.txt`.
    ///
    /// Without it, every `*.txt` file in the tasks directory is processed in
    /// turn.
    pub task: Option<String>,

    /// Path to the settings file.
    ///
    /// Merged on top of `~/.config/saver/config.toml`; both are optional.
    #[arg(short, long, default_value = "saver.toml")]
    pub config: PathBuf,

    /// Print the resolved settings and exit without running anything.
    #[arg(long)]
    pub print_config: bool,

    /// List the task definitions found and exit without running anything.
    #[arg(long, conflicts_with = "task")]
    pub list: bool,

    /// Abort a task as soon as a hook, tar/gpg or the uploader exits non-zero.
    ///
    /// By default those exit statuses are reported but otherwise ignored;
    /// only a missing archive stops a task.
    #[arg(long)]
    pub strict: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("saver").chain(args.iter().copied()))
    }

    #[test]
    fn no_arguments_means_batch_mode() {
        let cli = parse(&[]).unwrap();
        assert!(cli.task.is_none());
        assert_eq!(cli.config, PathBuf::from("saver.toml"));
        assert!(!cli.strict);
    }

    #[test]
    fn positional_argument_selects_a_task() {
        let cli = parse(&["Nightly"]).unwrap();
        assert_eq!(cli.task.as_deref(), Some("Nightly"));
    }

    #[test]
    fn at_most_one_task_is_accepted() {
        assert!(parse(&["one", "two"]).is_err());
    }

    #[test]
    fn list_conflicts_with_task() {
        assert!(parse(&["--list", "Nightly"]).is_err());
    }

    #[test]
    fn config_and_strict_flags() {
        let cli = parse(&["-c", "/etc/saver.toml", "--strict"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/saver.toml"));
        assert!(cli.strict);
    }
}
