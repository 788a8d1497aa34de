//! External collaborators: archiver, uploader, hook shell.
//!
//! The pipeline only sees the three narrow traits below.  [`System`] is the
//! real implementation (tar piped into gpg, `dropbox_uploader.sh`, `sh -c`);
//! tests substitute a recorder.
//!
//! Every call returns a [`StageOutcome`] rather than a bare `bool`, so the
//! caller decides whether a failure matters (see `strict` in
//! [`crate::config::Config`]).

use std::path::Path;

use crate::{
    config::Config,
    runner,
    ui::{StageOutcome, run_piped_stage, run_stage},
};

/// Produces the encrypted archive.
pub trait Archiver {
    /// Archive every path listed in `manifest`, encrypt it with `password`,
    /// and write the result to `target`.
    fn archive(&self, manifest: &Path, password: &str, target: &Path) -> StageOutcome;
}

/// Talks to remote storage.
pub trait Uploader {
    fn delete(&self, remote_dir: &str) -> StageOutcome;
    fn mkdir(&self, remote_dir: &str) -> StageOutcome;
    fn upload(&self, local: &Path, remote_file: &str) -> StageOutcome;
}

/// Runs `EXECBEFORE` / `EXECAFTER` snippets.
pub trait HookRunner {
    fn run_hook(&self, label: &str, command: &str) -> StageOutcome;
}

/// The set of collaborators one pipeline run uses.
#[derive(Clone, Copy)]
pub struct Toolchain<'a> {
    pub archiver: &'a dyn Archiver,
    pub uploader: &'a dyn Uploader,
    pub hooks: &'a dyn HookRunner,
}

impl<'a> Toolchain<'a> {
    /// Use one value for all three roles.
    pub fn uniform<T>(tools: &'a T) -> Self
    where
        T: Archiver + Uploader + HookRunner,
    {
        Self {
            archiver: tools,
            uploader: tools,
            hooks: tools,
        }
    }
}

// ─── Process-backed implementation ────────────────────────────────────────────

/// Spawns the binaries named in `[tools]`.
pub struct System<'a> {
    cfg: &'a Config,
}

impl<'a> System<'a> {
    pub const fn new(cfg: &'a Config) -> Self {
        Self { cfg }
    }
}

impl Archiver for System<'_> {
    fn archive(&self, manifest: &Path, password: &str, target: &Path) -> StageOutcome {
        run_piped_stage(
            "Archive",
            &runner::archive_display(self.cfg, manifest, password, target),
            &runner::tar_args(self.cfg, manifest),
            &runner::gpg_args(self.cfg, password, target),
        )
    }
}

impl Uploader for System<'_> {
    fn delete(&self, remote_dir: &str) -> StageOutcome {
        let args = runner::uploader_delete_args(self.cfg, remote_dir);
        run_stage("Remote delete", &args.join(" "), &args)
    }

    fn mkdir(&self, remote_dir: &str) -> StageOutcome {
        let args = runner::uploader_mkdir_args(self.cfg, remote_dir);
        run_stage("Remote mkdir", &args.join(" "), &args)
    }

    fn upload(&self, local: &Path, remote_file: &str) -> StageOutcome {
        let args = runner::uploader_upload_args(self.cfg, local, remote_file);
        run_stage("Upload", &args.join(" "), &args)
    }
}

impl HookRunner for System<'_> {
    fn run_hook(&self, label: &str, command: &str) -> StageOutcome {
        let args = runner::hook_args(self.cfg, command);
        run_stage(label, command, &args)
    }
}
