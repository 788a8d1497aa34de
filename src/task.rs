//! Task definitions — one backup job per `*.txt` file.
//!
//! # File format
//!
//! ```text
//! ENABLED=1
//! TASK=Nightly
//! PASSWORD=P4$$W0RD
//! EXECBEFORE=systemctl stop postgresql     # optional
//! EXECAFTER=systemctl start postgresql     # optional
//! PATHS
//! /var/lib/postgresql
//! /etc/postgresql
//! ```
//!
//! Directives may appear in any order and may carry a leading `@`
//! (`@TASK=Nightly`), which is how older task files were written.  `PATHS`
//! must come last: every line after it is one path.
//!
//! Parsing is split in two passes.  [`scan`] turns the text into a
//! [`RawDefinition`] (directive → raw value, plus the trailing path block)
//! without judging anything; [`RawDefinition::validate`] then produces either
//! a [`TaskDefinition`] or the first [`ParseError`] in the fixed order
//! status → name → password → paths.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Why a task definition was rejected.
///
/// Each mandatory directive has its own variants so callers (and tests) can
/// tell exactly which part of the file is wrong.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("config file is unreadable: {}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("task status is not defined (expected ENABLED=0 or ENABLED=1)")]
    StatusMissing,

    #[error("task status is invalid: ENABLED={0:?} (expected 0 or 1)")]
    StatusInvalid(String),

    #[error("task name is not defined")]
    NameMissing,

    #[error("task name is empty")]
    NameEmpty,

    #[error("task name {0:?} may only contain letters, digits, '_' and '-'")]
    NameInvalid(String),

    #[error("password is not defined")]
    PasswordMissing,

    #[error("password is empty")]
    PasswordEmpty,

    #[error("paths are not defined (missing PATHS section)")]
    PathsMissing,

    #[error("paths list is empty")]
    PathsEmpty,
}

impl ParseError {
    /// Stable short tag naming the directive at fault.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unreadable { .. } => "unreadable",
            Self::StatusMissing | Self::StatusInvalid(_) => "status",
            Self::NameMissing | Self::NameEmpty | Self::NameInvalid(_) => "name",
            Self::PasswordMissing | Self::PasswordEmpty => "password",
            Self::PathsMissing | Self::PathsEmpty => "paths",
        }
    }
}

// ─── Task definition ──────────────────────────────────────────────────────────

/// A validated backup job.
///
/// Built fresh for every discovered file and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    /// Identifier used in artifact names and the remote path.
    pub name: String,
    /// Symmetric encryption passphrase handed to gpg.
    pub password: String,
    /// Disabled tasks are discovered but never run.
    pub enabled: bool,
    /// Paths to archive, in file order.
    pub paths: Vec<String>,
    /// Shell command run before the archive is created.
    pub exec_before: Option<String>,
    /// Shell command run after upload and cleanup.
    pub exec_after: Option<String>,
}

// Hand-written so the passphrase never ends up in terminal output.
impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("paths", &self.paths)
            .field("exec_before", &self.exec_before)
            .field("exec_after", &self.exec_after)
            .finish()
    }
}

impl TaskDefinition {
    /// Parse a definition from the text of a task file.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        scan(text).validate()
    }

    /// Read and parse the task file at `path`.
    ///
    /// Anything that is not a readable regular file is reported as
    /// [`ParseError::Unreadable`].
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        if !path.is_file() {
            return Err(ParseError::Unreadable {
                path: path.to_path_buf(),
                source: None,
            });
        }

        let text = std::fs::read_to_string(path).map_err(|e| ParseError::Unreadable {
            path: path.to_path_buf(),
            source: Some(e),
        })?;

        Self::parse(&text)
    }
}

/// Returns `true` if `name` is usable as a task identifier.
///
/// The name ends up in local file names and remote paths, so separators and
/// whitespace are not allowed.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ─── Scan pass ────────────────────────────────────────────────────────────────

/// Directives recognised before the `PATHS` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    Enabled,
    Task,
    Password,
    ExecBefore,
    ExecAfter,
}

impl Directive {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "ENABLED" => Some(Self::Enabled),
            "TASK" => Some(Self::Task),
            "PASSWORD" => Some(Self::Password),
            "EXECBEFORE" => Some(Self::ExecBefore),
            "EXECAFTER" => Some(Self::ExecAfter),
            _ => None,
        }
    }
}

/// Untyped view of a task file, before any validation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RawDefinition<'a> {
    /// First value seen for each directive, already trimmed.
    pub directives: HashMap<Directive, &'a str>,
    /// Lines after the `PATHS` marker; `None` when the marker is absent.
    pub paths: Option<Vec<&'a str>>,
}

const PATHS_MARKER: &str = "PATHS";

/// Split `text` into directives and the trailing path block.
pub fn scan(text: &str) -> RawDefinition<'_> {
    let mut raw = RawDefinition::default();
    let mut lines = text.lines();

    for line in lines.by_ref() {
        let line = line.trim();
        let line = line.strip_prefix('@').unwrap_or(line);

        if line == PATHS_MARKER {
            raw.paths = Some(Vec::new());
            break;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if let Some(directive) = Directive::from_key(key.trim()) {
            raw.directives.entry(directive).or_insert(value.trim());
        }
    }

    if let Some(block) = raw.paths.as_mut() {
        block.extend(lines);
    }

    raw
}

// ─── Validate pass ────────────────────────────────────────────────────────────

impl RawDefinition<'_> {
    /// Turn the raw view into a [`TaskDefinition`], or report the first
    /// missing or malformed directive.
    pub fn validate(&self) -> Result<TaskDefinition, ParseError> {
        let enabled = match self.directives.get(&Directive::Enabled) {
            None => return Err(ParseError::StatusMissing),
            Some(&"1") => true,
            Some(&"0") => false,
            Some(other) => return Err(ParseError::StatusInvalid((*other).to_string())),
        };

        let name = match self.directives.get(&Directive::Task) {
            None => return Err(ParseError::NameMissing),
            Some(v) if v.is_empty() => return Err(ParseError::NameEmpty),
            Some(v) if !is_valid_name(v) => return Err(ParseError::NameInvalid((*v).to_string())),
            Some(v) => (*v).to_string(),
        };

        let password = match self.directives.get(&Directive::Password) {
            None => return Err(ParseError::PasswordMissing),
            Some(v) if v.is_empty() => return Err(ParseError::PasswordEmpty),
            Some(v) => (*v).to_string(),
        };

        let paths: Vec<String> = self
            .paths
            .as_ref()
            .ok_or(ParseError::PathsMissing)?
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if paths.is_empty() {
            return Err(ParseError::PathsEmpty);
        }

        Ok(TaskDefinition {
            name,
            password,
            enabled,
            paths,
            exec_before: self.hook(Directive::ExecBefore),
            exec_after: self.hook(Directive::ExecAfter),
        })
    }

    fn hook(&self, directive: Directive) -> Option<String> {
        self.directives
            .get(&directive)
            .map(|v| normalize_command(v))
            .filter(|c| !c.is_empty())
    }
}

/// Collapse newlines to spaces and trim the ends.
fn normalize_command(cmd: &str) -> String {
    cmd.replace(['\r', '\n'], " ").trim().to_string()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
