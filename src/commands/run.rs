//! Default command — discover tasks and back each one up.
//!
//! Failures are contained per task: a definition that does not parse, or a
//! pipeline that stops early, is reported and the next task runs.  Only two
//! conditions end the whole run with a non-zero exit:
//!
//! - the uploader is not installed (checked before anything else), and
//! - the process is not root when the first enabled task reaches PreCheck.
//!
//! Otherwise the exit status is zero no matter how many tasks failed; the
//! summary printed at the end is the place to look.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use crate::{
    cli::Cli,
    config::Config,
    discovery::{Selection, discover},
    host::Host,
    pipeline::Pipeline,
    tools::{System, Toolchain},
    ui::{self, TaskReport, TaskStatus, print_summary},
};

// ─── Entry point ──────────────────────────────────────────────────────────────

/// Run the task named on the command line, or every task.
pub fn run(cli: &Cli, cfg: &Config, host: &Host) -> Result<()> {
    ensure_uploader(cfg)?;

    let system = System::new(cfg);
    let selection = Selection::from_arg(cli.task.as_deref());
    let reports = execute(&selection, cfg, host, Toolchain::uniform(&system), Utc::now)?;

    print_summary(&reports);
    Ok(())
}

/// Fail unless the configured uploader exists.
pub fn ensure_uploader(cfg: &Config) -> Result<()> {
    if !cfg.tools.uploader.is_file() {
        bail!(
            "uploader is not installed: {} (set [tools].uploader)",
            cfg.tools.uploader.display()
        );
    }
    Ok(())
}

/// Drive every selected task through the pipeline.
///
/// `clock` is read once per task so a batch that crosses midnight dates each
/// archive by the day it was started on.
///
/// Returns one report per discovered task file, or an error if the run had to
/// stop altogether.  In that case the summary of the tasks handled so far,
/// the stopping one included, is printed before returning.
pub fn execute(
    selection: &Selection,
    cfg: &Config,
    host: &Host,
    tools: Toolchain<'_>,
    clock: impl Fn() -> DateTime<Utc>,
) -> Result<Vec<TaskReport>> {
    let found = discover(selection, &cfg.paths.tasks_dir)?;
    if found.is_empty() {
        ui::notice(&format!(
            "no task files found in {}",
            cfg.paths.tasks_dir.display()
        ));
    }

    let pipeline = Pipeline::new(cfg, host, tools);
    let mut reports = Vec::with_capacity(found.len());

    for item in found {
        let task = item.label();

        let definition = match item.definition {
            Ok(def) => def,
            Err(e) => {
                ui::error(&format!("{}: [{}] {e}", item.path.display(), e.kind()));
                reports.push(TaskReport {
                    task,
                    status: TaskStatus::Failed(e.to_string()),
                });
                continue;
            },
        };

        if !definition.enabled {
            ui::notice(&format!(
                "task defined in file '{}' is disabled",
                item.path.display()
            ));
            reports.push(TaskReport {
                task,
                status: TaskStatus::Disabled,
            });
            continue;
        }

        let status = match pipeline.run(&definition, clock()) {
            Ok(report) => {
                if report.archive_reused {
                    ui::notice(&format!("{task}: uploaded the archive already created today"));
                }
                let ignored = report.outcomes.iter().filter(|o| o.failed()).count();
                if ignored > 0 {
                    ui::notice(&format!(
                        "{task}: {ignored} external call(s) failed; see output above"
                    ));
                }
                TaskStatus::Done
            },
            Err(e) if e.is_fatal() => {
                reports.push(TaskReport {
                    task,
                    status: TaskStatus::Failed(e.to_string()),
                });
                print_summary(&reports);
                return Err(e.into());
            },
            Err(e) => {
                ui::error(&format!("{task}: aborted at {}: {e}", e.stage()));
                TaskStatus::Failed(e.to_string())
            },
        };
        reports.push(TaskReport { task, status });
    }

    Ok(reports)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use super::*;
    use crate::{
        pipeline::tests::{Recorder, jan_2, root_host, test_config},
        tools::Archiver,
        ui::StageOutcome,
    };

    fn write_task(cfg: &Config, file: &str, name: &str, enabled: bool) {
        fs::create_dir_all(&cfg.paths.tasks_dir).unwrap();
        fs::write(
            cfg.paths.tasks_dir.join(file),
            format!(
                "ENABLED={}\nTASK={name}\nPASSWORD=pw\nPATHS\n/etc\n",
                u8::from(enabled)
            ),
        )
        .unwrap();
    }

    /// Writes the archive for every task except `broken`.
    struct Flaky {
        broken: &'static str,
    }

    impl Archiver for Flaky {
        fn archive(&self, _manifest: &Path, _password: &str, target: &Path) -> StageOutcome {
            let name = target.file_name().unwrap().to_string_lossy();
            if !name.starts_with(self.broken) {
                fs::write(target, b"x").unwrap();
            }
            StageOutcome::ok("Archive")
        }
    }

    fn statuses(reports: &[TaskReport]) -> Vec<(&str, &TaskStatus)> {
        reports
            .iter()
            .map(|r| (r.task.as_str(), &r.status))
            .collect()
    }

    #[test]
    fn disabled_task_never_reaches_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        write_task(&cfg, "off.txt", "Off", false);
        let rec = Recorder::writing();

        let reports = execute(
            &Selection::All,
            &cfg,
            &root_host(),
            Toolchain::uniform(&rec),
            jan_2,
        )
        .unwrap();

        assert_eq!(statuses(&reports), vec![("Off", &TaskStatus::Disabled)]);
        assert!(rec.calls().is_empty());
        assert!(!cfg.paths.status_file.exists());
    }

    #[test]
    fn missing_archive_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        write_task(&cfg, "a.txt", "Alpha", true);
        write_task(&cfg, "b.txt", "Beta", true);
        let rec = Recorder::default();
        let flaky = Flaky { broken: "Alpha" };
        let tools = Toolchain {
            archiver: &flaky,
            uploader: &rec,
            hooks: &rec,
        };

        let reports = execute(&Selection::All, &cfg, &root_host(), tools, jan_2).unwrap();

        assert!(matches!(reports[0].status, TaskStatus::Failed(ref why) if why.contains("not available")));
        assert_eq!(reports[1].status, TaskStatus::Done);
        let uploads: Vec<_> = rec
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("upload"))
            .collect();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].contains("Beta_backup_20240102.tar.gpg"));
    }

    #[test]
    fn parse_errors_are_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        write_task(&cfg, "a.txt", "Alpha", true);
        fs::write(cfg.paths.tasks_dir.join("b.txt"), "ENABLED=1\nTASK=Beta\n").unwrap();
        let rec = Recorder::writing();

        let reports = execute(
            &Selection::All,
            &cfg,
            &root_host(),
            Toolchain::uniform(&rec),
            jan_2,
        )
        .unwrap();

        assert_eq!(reports[0].status, TaskStatus::Done);
        assert_eq!(reports[1].task, "b.txt");
        assert_eq!(
            reports[1].status,
            TaskStatus::Failed("password is not defined".into())
        );
    }

    #[test]
    fn unknown_single_task_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        write_task(&cfg, "a.txt", "Alpha", true);
        let rec = Recorder::writing();

        let reports = execute(
            &Selection::Single("Nope".into()),
            &cfg,
            &root_host(),
            Toolchain::uniform(&rec),
            jan_2,
        )
        .unwrap();

        assert_eq!(reports.len(), 1);
        assert!(
            matches!(reports[0].status, TaskStatus::Failed(ref why) if why.contains("config file is unreadable"))
        );
        assert!(rec.calls().is_empty());
        assert!(!cfg.paths.status_file.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1, "only tasks/");
    }

    #[test]
    fn single_task_runs_only_that_task() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        write_task(&cfg, "Alpha.txt", "Alpha", true);
        write_task(&cfg, "Beta.txt", "Beta", true);
        let rec = Recorder::writing();

        let reports = execute(
            &Selection::Single("Beta".into()),
            &cfg,
            &root_host(),
            Toolchain::uniform(&rec),
            jan_2,
        )
        .unwrap();

        assert_eq!(statuses(&reports), vec![("Beta", &TaskStatus::Done)]);
        assert!(rec.calls().iter().all(|c| !c.contains("Alpha")));
    }

    #[test]
    fn unprivileged_run_stops_everything() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        write_task(&cfg, "a.txt", "Alpha", true);
        write_task(&cfg, "b.txt", "Beta", true);
        let rec = Recorder::writing();
        let host = Host {
            hostname: "web-01".into(),
            euid: 1000,
        };

        let err = execute(&Selection::All, &cfg, &host, Toolchain::uniform(&rec), jan_2)
            .unwrap_err();

        assert!(err.to_string().contains("root"));
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn unprivileged_run_with_only_disabled_tasks_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        write_task(&cfg, "a.txt", "Alpha", false);
        let rec = Recorder::writing();
        let host = Host {
            hostname: "web-01".into(),
            euid: 1000,
        };

        let reports = execute(&Selection::All, &cfg, &host, Toolchain::uniform(&rec), jan_2)
            .unwrap();
        assert_eq!(reports[0].status, TaskStatus::Disabled);
    }

    #[test]
    fn empty_tasks_dir_yields_no_reports() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        let rec = Recorder::writing();

        let reports = execute(
            &Selection::All,
            &cfg,
            &root_host(),
            Toolchain::uniform(&rec),
            jan_2,
        )
        .unwrap();
        assert!(reports.is_empty());
    }

    #[test]
    fn ensure_uploader_requires_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = test_config(dir.path());

        cfg.tools.uploader = dir.path().join("missing.sh");
        let err = ensure_uploader(&cfg).unwrap_err();
        assert!(err.to_string().contains("not installed"));

        cfg.tools.uploader = dir.path().to_path_buf();
        assert!(ensure_uploader(&cfg).is_err(), "a directory is not an uploader");

        let script = dir.path().join("uploader.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        cfg.tools.uploader = script;
        assert!(ensure_uploader(&cfg).is_ok());
    }
}
