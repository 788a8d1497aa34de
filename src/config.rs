//! Settings types and loading logic.
//!
//! `Config` holds everything that used to be a hard-coded global: where task
//! files live, where scratch artifacts go, which binaries to call, and how the
//! remote layout is rooted.  It is built once in `main` and then passed by
//! reference everywhere else — nothing reads settings from ambient state.
//!
//! Every field has a default, so the settings file is entirely optional.
//!
//! # File format
//!
//! ```toml
//! strict = false          # abort a task when a hook or tool exits non-zero
//!
//! [paths]
//! tasks_dir   = "/usr/local/lib/saver/tasks"
//! scratch_dir = "/tmp"
//! status_file = "/tmp/backup_status.txt"
//!
//! [tools]
//! tar      = "/bin/tar"
//! gpg      = "/usr/bin/gpg"
//! uploader = "/opt/dropbox-uploader/dropbox_uploader.sh"
//! shell    = "/bin/sh"
//!
//! [remote]
//! root = "/Backup"
//! host = "web-01"         # optional; defaults to the machine hostname
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ─── Top-level ────────────────────────────────────────────────────────────────

/// Resolved, immutable settings for one process run.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// When set, a hook or tool exiting non-zero aborts the current task.
    #[serde(default)]
    pub strict: bool,

    /// Local directories and files.
    #[serde(default)]
    pub paths: PathsConfig,

    /// External binaries.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Remote destination layout.
    #[serde(default)]
    pub remote: RemoteConfig,
}

// ─── [paths] ──────────────────────────────────────────────────────────────────

/// Where task definitions are read from and where transient artifacts go.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PathsConfig {
    /// Directory scanned for `*.txt` task definitions (non-recursive).
    pub tasks_dir: PathBuf,

    /// Directory holding the archive and its manifest while a task runs.
    pub scratch_dir: PathBuf,

    /// Liveness marker written at the start of a task and removed at the end.
    ///
    /// Contains two lines: the task name and a Unix timestamp.  External
    /// monitoring can watch it to spot a long-running or stuck archive.
    pub status_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tasks_dir: default_tasks_dir(),
            scratch_dir: PathBuf::from("/tmp"),
            status_file: PathBuf::from("/tmp/backup_status.txt"),
        }
    }
}

// ─── [tools] ──────────────────────────────────────────────────────────────────

/// Absolute paths of the external programs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ToolsConfig {
    pub tar: PathBuf,
    pub gpg: PathBuf,

    /// `dropbox_uploader.sh` (or anything speaking its `delete` / `mkdir` /
    /// `upload` sub-commands).  Checked for existence at startup.
    pub uploader: PathBuf,

    /// Shell used for `EXECBEFORE` / `EXECAFTER` hooks.
    pub shell: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tar: PathBuf::from("/bin/tar"),
            gpg: PathBuf::from("/usr/bin/gpg"),
            uploader: PathBuf::from("/opt/dropbox-uploader/dropbox_uploader.sh"),
            shell: PathBuf::from("/bin/sh"),
        }
    }
}

// ─── [remote] ─────────────────────────────────────────────────────────────────

/// Remote layout: `<root>/<host>/<task>/<task>_backup_<date>.tar.gpg`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteConfig {
    pub root: String,

    /// Overrides the detected hostname in the remote path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            root: String::from("/Backup"),
            host: None,
        }
    }
}

// ─── Defaults ─────────────────────────────────────────────────────────────────

/// `<directory of the running binary>/tasks`, or `./tasks` if that cannot be
/// determined.
pub fn default_tasks_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("tasks")))
        .unwrap_or_else(|| PathBuf::from("tasks"))
}

// ─── Partial config (layered loading) ─────────────────────────────────────────

/// A settings file where every field is optional.
///
/// Two of these (global and local) are merged field by field before being
/// resolved into a [`Config`].
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    pub strict: Option<bool>,
    #[serde(default)]
    pub paths: PartialPaths,
    #[serde(default)]
    pub tools: PartialTools,
    #[serde(default)]
    pub remote: PartialRemote,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialPaths {
    pub tasks_dir: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub status_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialTools {
    pub tar: Option<PathBuf>,
    pub gpg: Option<PathBuf>,
    pub uploader: Option<PathBuf>,
    pub shell: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialRemote {
    pub root: Option<String>,
    pub host: Option<String>,
}

impl PartialConfig {
    /// Layer `over` on top of `self`; any field set in `over` wins.
    #[must_use]
    pub fn merge(self, over: Self) -> Self {
        Self {
            strict: over.strict.or(self.strict),
            paths: PartialPaths {
                tasks_dir: over.paths.tasks_dir.or(self.paths.tasks_dir),
                scratch_dir: over.paths.scratch_dir.or(self.paths.scratch_dir),
                status_file: over.paths.status_file.or(self.paths.status_file),
            },
            tools: PartialTools {
                tar: over.tools.tar.or(self.tools.tar),
                gpg: over.tools.gpg.or(self.tools.gpg),
                uploader: over.tools.uploader.or(self.tools.uploader),
                shell: over.tools.shell.or(self.tools.shell),
            },
            remote: PartialRemote {
                root: over.remote.root.or(self.remote.root),
                host: over.remote.host.or(self.remote.host),
            },
        }
    }

    /// Fill every unset field with its default.
    pub fn resolve(self) -> Config {
        let paths = PathsConfig::default();
        let tools = ToolsConfig::default();
        let remote = RemoteConfig::default();

        Config {
            strict: self.strict.unwrap_or(false),
            paths: PathsConfig {
                tasks_dir: self.paths.tasks_dir.unwrap_or(paths.tasks_dir),
                scratch_dir: self.paths.scratch_dir.unwrap_or(paths.scratch_dir),
                status_file: self.paths.status_file.unwrap_or(paths.status_file),
            },
            tools: ToolsConfig {
                tar: self.tools.tar.unwrap_or(tools.tar),
                gpg: self.tools.gpg.unwrap_or(tools.gpg),
                uploader: self.tools.uploader.unwrap_or(tools.uploader),
                shell: self.tools.shell.unwrap_or(tools.shell),
            },
            remote: RemoteConfig {
                root: self.remote.root.unwrap_or(remote.root),
                host: self.remote.host.or(remote.host),
            },
        }
    }
}

// ─── Loader ───────────────────────────────────────────────────────────────────

/// Read `path` as a [`PartialConfig`].
///
/// Returns `Ok(None)` if the file does not exist, and an error if it exists
/// but cannot be read or is not valid TOML.
pub fn parse_partial(path: &Path) -> Result<Option<PartialConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    toml::from_str(&text)
        .map(Some)
        .with_context(|| format!("parsing {}", path.display()))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
