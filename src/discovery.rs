//! Finding task definitions on disk.
//!
//! Two modes, picked by the optional positional argument:
//!
//! - **Batch** (no argument): every `*.txt` file directly inside `tasks_dir`, in path order.
//! - **Single** (`saver <name>`): exactly `tasks_dir/<name>.txt`.  A bad or unknown name is
//!   reported as unreadable; there is no fallback to batch mode.

use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::task::{ParseError, TaskDefinition, is_valid_name};

/// Extension of task definition files.
pub const TASK_EXTENSION: &str = "txt";

/// Which task files to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Single(String),
}

impl Selection {
    pub fn from_arg(arg: Option<&str>) -> Self {
        arg.map_or(Self::All, |name| Self::Single(name.to_string()))
    }
}

/// One task file and the result of parsing it.
#[derive(Debug)]
pub struct Discovered {
    pub path: PathBuf,
    pub definition: Result<TaskDefinition, ParseError>,
}

impl Discovered {
    fn load(path: PathBuf) -> Self {
        let definition = TaskDefinition::load(&path);
        Self { path, definition }
    }

    /// The task name if it parsed, otherwise the file name.
    pub fn label(&self) -> String {
        match &self.definition {
            Ok(def) => def.name.clone(),
            Err(_) => self
                .path
                .file_name()
                .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned()),
        }
    }
}

/// `tasks_dir/<name>.txt`.
///
/// Names that could escape `tasks_dir` (or otherwise are not task
/// identifiers) are rejected as unreadable without touching the filesystem.
pub fn task_path(tasks_dir: &Path, name: &str) -> Result<PathBuf, ParseError> {
    if !is_valid_name(name) {
        return Err(ParseError::Unreadable {
            path: PathBuf::from(name),
            source: None,
        });
    }
    Ok(tasks_dir.join(format!("{name}.{TASK_EXTENSION}")))
}

/// Every task file directly inside `tasks_dir`, sorted by path.
///
/// A missing directory yields an empty list.
pub fn task_files(tasks_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(tasks_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("reading {}", tasks_dir.display()));
        },
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("reading {}", tasks_dir.display()))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == TASK_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Resolve `selection` against `tasks_dir` and parse each file found.
pub fn discover(selection: &Selection, tasks_dir: &Path) -> Result<Vec<Discovered>> {
    match selection {
        Selection::Single(name) => Ok(vec![match task_path(tasks_dir, name) {
            Ok(path) => Discovered::load(path),
            Err(e) => Discovered {
                path: PathBuf::from(name),
                definition: Err(e),
            },
        }]),
        Selection::All => Ok(task_files(tasks_dir)?
            .into_iter()
            .map(Discovered::load)
            .collect()),
    }
}
