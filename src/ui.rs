//! Terminal UI — spinners, stage lines, captured command output.
//!
//! # Design goals
//!
//! - **Clean by default.** While a stage is running the user sees only a spinner and a short label.
//!   Raw tar/gpg/uploader output is captured and hidden.
//! - **Informative on failure.** If a stage exits non-zero its captured stdout *and* stderr are
//!   printed in full so the operator can diagnose the problem without re-running manually.
//! - **Testable without a terminal.** [`StageOutcome`] and [`TaskReport`] are plain data types, so
//!   pipeline tests can inspect results without looking at the terminal at all.

use std::{
    io::Read,
    process::{Command, Output, Stdio},
    time::Duration,
};

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

// ─── Icons ───────────────────────────────────────────────────────────────────

/// Braille spinner frames — same style as indicatif's default.
static SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Green ✓  — printed when a stage succeeds.
fn icon_ok() -> console::StyledObject<&'static str> {
    style("✓").green().bold()
}
/// Red ✗    — printed when a stage fails.
fn icon_err() -> console::StyledObject<&'static str> {
    style("✗").red().bold()
}
/// Dim –    — printed for skipped stages and disabled tasks.
fn icon_skip() -> console::StyledObject<&'static str> {
    style("–").dim()
}
/// Cyan ✓   — printed next to the final success summary.
fn icon_done() -> console::StyledObject<&'static str> {
    style("✓").cyan().bold()
}

// ─── Stage result ─────────────────────────────────────────────────────────────

/// The outcome of a single external call.
///
/// Carries the stage label plus whatever the command wrote to stdout/stderr so
/// it can be replayed to the terminal when something goes wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    /// Human-readable stage label, e.g. `"Upload"`.
    pub label: String,
    /// Whether the stage completed without error.
    pub success: bool,
    /// Everything the command wrote to stdout.
    pub stdout: String,
    /// Everything the command wrote to stderr.
    pub stderr: String,
    /// Spawn failure or non-zero exit description, if any.
    pub error: Option<String>,
}

impl StageOutcome {
    /// A successful outcome with no captured output.
    pub fn ok(label: &str) -> Self {
        Self {
            label: label.to_string(),
            success: true,
            stdout: String::new(),
            stderr: String::new(),
            error: None,
        }
    }

    /// A failed outcome carrying only an error message.
    pub fn err(label: &str, error: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error.into()),
        }
    }

    /// Print the one-line summary (✓/✗ + label) to stdout.
    ///
    /// On failure, also prints the captured stdout/stderr and the error
    /// message so the operator has everything they need without re-running.
    pub fn print(&self) {
        if self.success {
            println!("  {}  {}", icon_ok(), style(&self.label).bold());
        } else {
            println!("  {}  {}", icon_err(), style(&self.label).bold());

            if let Some(ref msg) = self.error {
                eprintln!();
                eprintln!("  {} {}", style("Error:").red().bold(), msg);
            }

            if !self.stdout.is_empty() {
                eprintln!();
                eprintln!("  {} stdout:", style("►").dim());
                for line in self.stdout.lines() {
                    eprintln!("    {line}");
                }
            }
            if !self.stderr.is_empty() {
                eprintln!();
                eprintln!("  {} stderr:", style("►").dim());
                for line in self.stderr.lines() {
                    eprintln!("    {line}");
                }
            }
        }
    }

    /// Returns `true` if the stage did not succeed.
    pub const fn failed(&self) -> bool {
        !self.success
    }

    /// One-line description for error messages.
    pub fn detail(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| format!("{} failed", self.label))
    }
}

// ─── Messages ─────────────────────────────────────────────────────────────────

/// `* Starting backup for task: <name>`
pub fn task_banner(name: &str) {
    println!();
    println!(
        "{} Starting backup for task: {}",
        style("*").cyan().bold(),
        style(name).bold()
    );
}

/// An indented `key: value` line under the current task.
pub fn detail(key: &str, value: impl std::fmt::Display) {
    println!("     {} {value}", style(format!("{key}:")).dim());
}

/// A stage that was deliberately not run.
pub fn skipped(label: &str, reason: &str) {
    println!(
        "  {}  {} {}",
        icon_skip(),
        style(label).bold(),
        style(format!("({reason})")).dim()
    );
}

/// A non-fatal notice, e.g. a disabled task.
pub fn notice(msg: &str) {
    println!("{} {msg}", style("NOTICE:").yellow().bold());
}

/// A task-scoped or fatal error.
pub fn error(msg: &str) {
    eprintln!("{} {msg}", style("Error:").red().bold());
}

// ─── Spinner ──────────────────────────────────────────────────────────────────

/// Create and start an indeterminate spinner for `label`.
///
/// The spinner ticks at ~80 ms and is automatically cleared when
/// [`ProgressBar::finish_and_clear`] is called.
fn make_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(s) = ProgressStyle::with_template("  {spinner:.cyan}  {msg}") {
        pb.set_style(s.tick_chars(SPINNER_CHARS));
    }
    pb.set_message(format!("{}", style(label).dim()));
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ─── Captured execution ───────────────────────────────────────────────────────

/// Run a command, capturing both stdout and stderr.
///
/// Output is buffered so the spinner can own the terminal while the command
/// runs.
///
/// Returns `(success, stdout_text, stderr_text)`.
pub fn run_captured(args: &[String]) -> Result<(bool, String, String)> {
    let (prog, rest) = args.split_first().context("cannot run an empty command")?;

    let output: Output = Command::new(prog)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to spawn: {prog}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    Ok((output.status.success(), stdout, stderr))
}

/// Run `producer | consumer`, capturing the consumer's stdout and both
/// processes' stderr.
///
/// The producer's stderr is drained on a helper thread; otherwise a chatty
/// producer could fill the pipe and block while we wait on the consumer.
///
/// Succeeds only if both processes exit zero.
pub fn run_piped_captured(
    producer: &[String],
    consumer: &[String],
) -> Result<(bool, String, String)> {
    let (p_prog, p_rest) = producer
        .split_first()
        .context("cannot run an empty command")?;
    let (c_prog, c_rest) = consumer
        .split_first()
        .context("cannot run an empty command")?;

    let mut first = Command::new(p_prog)
        .args(p_rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn: {p_prog}"))?;

    let pipe = first.stdout.take().context("producer stdout not captured")?;
    let mut first_stderr = first.stderr.take().context("producer stderr not captured")?;
    let drain = std::thread::spawn(move || {
        let mut buf = Vec::new();
        // A read error only loses diagnostics.
        let _ = first_stderr.read_to_end(&mut buf);
        buf
    });

    let second = Command::new(c_prog)
        .args(c_rest)
        .stdin(Stdio::from(pipe))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();

    // Reap the producer even when the consumer could not be started.
    let first_status = first.wait().context("waiting for producer")?;
    let first_stderr = drain.join().unwrap_or_default();
    let second = second.with_context(|| format!("failed to spawn: {c_prog}"))?;

    let mut stderr = String::from_utf8_lossy(&first_stderr).into_owned();
    stderr.push_str(&String::from_utf8_lossy(&second.stderr));
    let stdout = String::from_utf8_lossy(&second.stdout).into_owned();

    Ok((
        first_status.success() && second.status.success(),
        stdout,
        stderr,
    ))
}

// ─── High-level stage runners ─────────────────────────────────────────────────

/// Turn a captured result into a [`StageOutcome`].
fn outcome(label: &str, shown: &str, result: Result<(bool, String, String)>) -> StageOutcome {
    match result {
        Ok((true, stdout, stderr)) => StageOutcome {
            label: label.to_string(),
            success: true,
            stdout,
            stderr,
            error: None,
        },
        Ok((false, stdout, stderr)) => StageOutcome {
            label: label.to_string(),
            success: false,
            stdout,
            stderr,
            error: Some(format!("command exited non-zero: {shown}")),
        },
        Err(e) => StageOutcome {
            label: label.to_string(),
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(format!("{e:#}")),
        },
    }
}

/// Run a single command behind a spinner, returning a [`StageOutcome`].
///
/// `shown` is what appears in the failure message in place of the real
/// argument list, so secrets in `args` never reach the terminal.
///
/// The spinner is cleared before the outcome is returned, so the terminal
/// always shows a clean, static line once the caller prints it.
pub fn run_stage(label: &str, shown: &str, args: &[String]) -> StageOutcome {
    let spinner = make_spinner(label);
    let result = run_captured(args);
    spinner.finish_and_clear();
    outcome(label, shown, result)
}

/// Like [`run_stage`] for a two-process pipe.
pub fn run_piped_stage(
    label: &str,
    shown: &str,
    producer: &[String],
    consumer: &[String],
) -> StageOutcome {
    let spinner = make_spinner(label);
    let result = run_piped_captured(producer, consumer);
    spinner.finish_and_clear();
    outcome(label, shown, result)
}

// ─── Summary banner ───────────────────────────────────────────────────────────

/// How a single task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Done,
    Disabled,
    Failed(String),
}

/// One line of the end-of-run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Task name, or the file name when the definition did not parse.
    pub task: String,
    pub status: TaskStatus,
}

impl TaskReport {
    pub const fn failed(&self) -> bool {
        matches!(self.status, TaskStatus::Failed(_))
    }
}

/// Print the final summary after all tasks have been handled.
pub fn print_summary(reports: &[TaskReport]) {
    println!();
    if reports.is_empty() {
        println!("  {}  {}", icon_skip(), style("No tasks found.").dim());
        println!();
        return;
    }

    for r in reports {
        match &r.status {
            TaskStatus::Done => println!("  {}  {}", icon_ok(), r.task),
            TaskStatus::Disabled => {
                println!("  {}  {} {}", icon_skip(), r.task, style("(disabled)").dim());
            },
            TaskStatus::Failed(why) => {
                println!("  {}  {} {}", icon_err(), r.task, style(format!("({why})")).red());
            },
        }
    }

    let failed = reports.iter().filter(|r| r.failed()).count();
    println!();
    if failed == 0 {
        println!(
            "  {} {}",
            icon_done(),
            style("All tasks completed successfully.").cyan().bold()
        );
    } else {
        eprintln!(
            "  {}  {}",
            icon_err(),
            style(format!("{failed} of {} task(s) failed.", reports.len()))
                .red()
                .bold()
        );
    }
    println!();
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_string()).collect()
    }

    // ── StageOutcome ──────────────────────────────────────────────────────────

    #[test]
    fn ok_outcome_is_not_failed() {
        assert!(!StageOutcome::ok("Upload").failed());
    }

    #[test]
    fn err_outcome_is_failed_and_keeps_message() {
        let o = StageOutcome::err("Upload", "no network");
        assert!(o.failed());
        assert_eq!(o.detail(), "no network");
    }

    #[test]
    fn detail_falls_back_to_label() {
        let mut o = StageOutcome::ok("Hook");
        o.success = false;
        assert_eq!(o.detail(), "Hook failed");
    }

    // ── run_captured ─────────────────────────────────────────────────────────

    #[test]
    fn run_captured_true_succeeds() {
        let (ok, _out, _err) = run_captured(&strings(&["true"])).unwrap();
        assert!(ok);
    }

    #[test]
    fn run_captured_false_fails() {
        let (ok, _out, _err) = run_captured(&strings(&["false"])).unwrap();
        assert!(!ok);
    }

    #[test]
    fn run_captured_captures_stdout_and_stderr() {
        let (ok, out, err) =
            run_captured(&strings(&["sh", "-c", "echo hello; echo oops >&2"])).unwrap();
        assert!(ok);
        assert!(out.contains("hello"));
        assert!(err.contains("oops"));
    }

    #[test]
    fn run_captured_empty_args_errors() {
        assert!(run_captured(&[]).is_err());
    }

    #[test]
    fn run_captured_missing_binary_errors() {
        assert!(run_captured(&strings(&["/nonexistent/saver-tool"])).is_err());
    }

    // ── run_piped_captured ────────────────────────────────────────────────────

    #[test]
    fn piped_output_reaches_consumer() {
        let (ok, out, _err) = run_piped_captured(
            &strings(&["sh", "-c", "printf 'a\\nb\\nc\\n'"]),
            &strings(&["wc", "-l"]),
        )
        .unwrap();
        assert!(ok);
        assert_eq!(out.trim(), "3");
    }

    #[test]
    fn piped_producer_failure_fails_the_pipe() {
        let (ok, _out, err) = run_piped_captured(
            &strings(&["sh", "-c", "echo broken >&2; exit 2"]),
            &strings(&["cat"]),
        )
        .unwrap();
        assert!(!ok);
        assert!(err.contains("broken"));
    }

    #[test]
    fn piped_consumer_failure_fails_the_pipe() {
        let (ok, _out, _err) =
            run_piped_captured(&strings(&["echo", "x"]), &strings(&["false"])).unwrap();
        assert!(!ok);
    }

    #[test]
    fn piped_missing_consumer_errors() {
        let result =
            run_piped_captured(&strings(&["true"]), &strings(&["/nonexistent/saver-tool"]));
        assert!(result.is_err());
    }

    // ── run_stage ─────────────────────────────────────────────────────────────

    #[test]
    fn run_stage_success_sets_success_true() {
        let o = run_stage("Test", "true", &strings(&["true"]));
        assert!(o.success);
        assert_eq!(o.label, "Test");
        assert!(o.error.is_none());
    }

    #[test]
    fn run_stage_failure_uses_shown_text_not_args() {
        let o = run_stage("Test", "gpg …", &strings(&["sh", "-c", "exit 1", "s3cr3t"]));
        assert!(!o.success);
        let msg = o.error.unwrap();
        assert!(msg.contains("gpg …"));
        assert!(!msg.contains("s3cr3t"));
    }

    // ── print_summary ─────────────────────────────────────────────────────────

    #[test]
    fn task_report_failed_only_for_failed_status() {
        let done = TaskReport {
            task: "a".into(),
            status: TaskStatus::Done,
        };
        let off = TaskReport {
            task: "b".into(),
            status: TaskStatus::Disabled,
        };
        let bad = TaskReport {
            task: "c".into(),
            status: TaskStatus::Failed("boom".into()),
        };
        assert!(!done.failed());
        assert!(!off.failed());
        assert!(bad.failed());

        // Smoke test: rendering must not panic.
        print_summary(&[done, off, bad]);
        print_summary(&[]);
    }
}
