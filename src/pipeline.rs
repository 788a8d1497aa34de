//! The per-task backup pipeline.
//!
//! # Stages (in order)
//!
//! | # | Stage         | Fatal on failure          | Description                               |
//! |---|---------------|---------------------------|-------------------------------------------|
//! | 1 | PreCheck      | whole run (not root)      | Root check, artifact names, manifest      |
//! | 2 | Hooks(Before) | strict mode only          | `EXECBEFORE` via the hook shell           |
//! | 3 | Archive       | strict mode only          | `tar | gpg` unless today's archive exists |
//! | 4 | Verify        | task                      | The archive file must exist               |
//! | 5 | Upload        | strict mode only          | Remote delete, mkdir, upload              |
//! | 6 | Cleanup       | task (IO errors only)     | Remove status marker, archive, manifest   |
//! | 7 | Hooks(After)  | strict mode only          | `EXECAFTER` via the hook shell            |
//!
//! Artifact names depend only on the task name and the UTC date, so a second
//! run on the same day finds the archive already on disk and skips straight
//! to the upload.  Nothing checks that such an archive is complete, so an
//! aborted task removes its status marker and manifest, and also the archive
//! when the archive call itself failed.

use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    config::Config,
    host::Host,
    task::TaskDefinition,
    tools::Toolchain,
    ui::{self, StageOutcome},
};

// ─── Stages ───────────────────────────────────────────────────────────────────

/// The working stages of a run.  A run ends either done (`Ok`) or aborted
/// (`Err`, with [`PipelineError::stage`] naming where it stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreCheck,
    HooksBefore,
    Archive,
    Verify,
    Upload,
    Cleanup,
    HooksAfter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreCheck => "pre-check",
            Self::HooksBefore => "before hook",
            Self::Archive => "archive",
            Self::Verify => "verify",
            Self::Upload => "upload",
            Self::Cleanup => "cleanup",
            Self::HooksAfter => "after hook",
        })
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Why a pipeline run was aborted.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Raised at PreCheck.  Unlike every other variant this stops the whole
    /// run, not just the current task.
    #[error("saver has to run as root (effective uid is {euid})")]
    NotPrivileged { euid: u32 },

    #[error(
        "backup target {} is not available, possibly archive creation failed",
        .0.display()
    )]
    ArchiveMissing(PathBuf),

    /// A hook or tool exited non-zero while strict mode was on.
    #[error("{stage} failed: {detail}")]
    StageFailed { stage: Stage, detail: String },

    #[error("{stage}: {context}")]
    Io {
        stage: Stage,
        context: String,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    /// `true` when the error must stop processing of every remaining task.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::NotPrivileged { .. })
    }

    /// The stage the run was in when it stopped.
    pub const fn stage(&self) -> Stage {
        match self {
            Self::NotPrivileged { .. } => Stage::PreCheck,
            Self::ArchiveMissing(_) => Stage::Verify,
            Self::StageFailed { stage, .. } | Self::Io { stage, .. } => *stage,
        }
    }
}

fn io_err(stage: Stage, context: String) -> impl FnOnce(io::Error) -> PipelineError {
    move |source| PipelineError::Io {
        stage,
        context,
        source,
    }
}

// ─── Artifacts ────────────────────────────────────────────────────────────────

/// Deterministic local and remote names for one task on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// `<task>_backup_<YYYYMMDD>.tar.gpg`
    pub archive_name: String,
    /// `<scratch_dir>/<archive_name>`
    pub archive: PathBuf,
    /// `<archive>-paths.txt`, the list handed to tar.
    pub manifest: PathBuf,
    /// `<remote.root>/<host>/<task>`
    pub remote_dir: String,
    /// `<remote_dir>/<archive_name>`
    pub remote_file: String,
}

impl Artifacts {
    pub fn new(cfg: &Config, host: &Host, task: &str, now: DateTime<Utc>) -> Self {
        let archive_name = format!("{task}_backup_{}.tar.gpg", now.format("%Y%m%d"));
        let archive = cfg.paths.scratch_dir.join(&archive_name);

        let mut manifest = archive.clone().into_os_string();
        manifest.push("-paths.txt");

        let remote_dir = format!(
            "{}/{}/{task}",
            cfg.remote.root.trim_end_matches('/'),
            host.hostname
        );
        let remote_file = format!("{remote_dir}/{archive_name}");

        Self {
            archive_name,
            archive,
            manifest: PathBuf::from(manifest),
            remote_dir,
            remote_file,
        }
    }
}

// ─── Report ───────────────────────────────────────────────────────────────────

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub artifacts: Artifacts,
    /// The archive from an earlier run today was uploaded instead of a new one.
    pub archive_reused: bool,
    /// Every external call, in order, with its outcome.
    pub outcomes: Vec<StageOutcome>,
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────

/// Drives one [`TaskDefinition`] through every stage.
pub struct Pipeline<'a> {
    cfg: &'a Config,
    host: &'a Host,
    tools: Toolchain<'a>,
}

impl<'a> Pipeline<'a> {
    pub const fn new(cfg: &'a Config, host: &'a Host, tools: Toolchain<'a>) -> Self {
        Self { cfg, host, tools }
    }

    /// Run every stage for `task`, dating artifacts with `now`.
    pub fn run(
        &self,
        task: &TaskDefinition,
        now: DateTime<Utc>,
    ) -> Result<PipelineReport, PipelineError> {
        // ── PreCheck ──────────────────────────────────────────────────────────
        if !self.host.is_privileged() {
            return Err(PipelineError::NotPrivileged {
                euid: self.host.euid,
            });
        }

        ui::task_banner(&task.name);

        let artifacts = Artifacts::new(self.cfg, self.host, &task.name, now);
        let mut report = PipelineReport {
            artifacts,
            archive_reused: false,
            outcomes: Vec::new(),
        };

        match self.attempt(task, now, &mut report) {
            Ok(()) => Ok(report),
            Err(e) => {
                self.discard(&report.artifacts, e.stage() == Stage::Archive);
                Err(e)
            },
        }
    }

    /// Every stage after the privilege check.  Any error leaves cleanup to
    /// [`Self::discard`].
    fn attempt(
        &self,
        task: &TaskDefinition,
        now: DateTime<Utc>,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let manifest = report.artifacts.manifest.clone();
        write_lines(&manifest, &task.paths).map_err(io_err(
            Stage::PreCheck,
            format!("writing manifest {}", manifest.display()),
        ))?;

        ui::detail("Target", report.artifacts.archive.display());
        ui::detail("Remote", &report.artifacts.remote_file);
        ui::detail("Paths", task.paths.join(", "));

        let status_file = &self.cfg.paths.status_file;
        write_lines(status_file, &[task.name.clone(), now.timestamp().to_string()]).map_err(
            io_err(
                Stage::PreCheck,
                format!("writing status file {}", status_file.display()),
            ),
        )?;

        // ── Hooks(Before) ─────────────────────────────────────────────────────
        if let Some(cmd) = &task.exec_before {
            let o = self.tools.hooks.run_hook("Before hook", cmd);
            self.record(report, Stage::HooksBefore, o)?;
        }

        // ── Archive ───────────────────────────────────────────────────────────
        let archive = report.artifacts.archive.clone();
        if archive.exists() {
            ui::skipped("Archive", "target archive already exists");
            report.archive_reused = true;
        } else {
            let o = self.tools.archiver.archive(&manifest, &task.password, &archive);
            self.record(report, Stage::Archive, o)?;
        }

        // ── Verify ────────────────────────────────────────────────────────────
        if !archive.is_file() {
            return Err(PipelineError::ArchiveMissing(archive));
        }

        // ── Upload ────────────────────────────────────────────────────────────
        let remote_dir = report.artifacts.remote_dir.clone();
        let remote_file = report.artifacts.remote_file.clone();

        let o = self.tools.uploader.delete(&remote_dir);
        self.record(report, Stage::Upload, o)?;
        let o = self.tools.uploader.mkdir(&remote_dir);
        self.record(report, Stage::Upload, o)?;
        let o = self.tools.uploader.upload(&archive, &remote_file);
        self.record(report, Stage::Upload, o)?;

        // ── Cleanup ───────────────────────────────────────────────────────────
        for path in [status_file, &archive, &manifest] {
            remove_if_exists(path).map_err(io_err(
                Stage::Cleanup,
                format!("removing {}", path.display()),
            ))?;
        }
        StageOutcome::ok("Cleanup").print();

        // ── Hooks(After) ──────────────────────────────────────────────────────
        if let Some(cmd) = &task.exec_after {
            let o = self.tools.hooks.run_hook("After hook", cmd);
            self.record(report, Stage::HooksAfter, o)?;
        }

        Ok(())
    }

    /// Remove what an aborted attempt left behind.
    ///
    /// The status marker and manifest always go.  The archive goes only when
    /// its own creation failed; an archive that was fine but not uploaded is
    /// kept so the next run today can reuse it.
    fn discard(&self, artifacts: &Artifacts, archive_suspect: bool) {
        let mut leftovers = vec![&self.cfg.paths.status_file, &artifacts.manifest];
        if archive_suspect {
            leftovers.push(&artifacts.archive);
        }
        for path in leftovers {
            if let Err(e) = remove_if_exists(path) {
                ui::error(&format!("could not remove {}: {e}", path.display()));
            }
        }
    }

    /// Print and keep `outcome`; in strict mode a failure ends the run.
    fn record(
        &self,
        report: &mut PipelineReport,
        stage: Stage,
        outcome: StageOutcome,
    ) -> Result<(), PipelineError> {
        outcome.print();
        let failure = (self.cfg.strict && outcome.failed()).then(|| outcome.detail());
        report.outcomes.push(outcome);

        match failure {
            Some(detail) => Err(PipelineError::StageFailed { stage, detail }),
            None => Ok(()),
        }
    }
}

// ─── File helpers ─────────────────────────────────────────────────────────────

/// Overwrite `path` with `lines`, newline-terminated.
fn write_lines(path: &Path, lines: &[String]) -> io::Result<()> {
    let mut text = lines.join("\n");
    text.push('\n');
    std::fs::write(path, text)
}

/// Remove `path`; a file that is already gone is not an error.
fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
