//! Command argument construction helpers.
//!
//! This module is responsible for *building* the argument vectors handed to
//! tar, gpg, the uploader and the hook shell.  It deliberately does **not**
//! execute anything — process execution lives in [`crate::ui`] and is wired up
//! in [`crate::tools`].
//!
//! Every value (task name, passphrase, paths) is its own argv element; nothing
//! is ever spliced into a shell string, so a hostile path or password cannot
//! inject commands.

use std::path::Path;

use crate::config::Config;

fn path_arg(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

// ─── Archive ──────────────────────────────────────────────────────────────────

/// `tar -c -f - --files-from=<manifest>` — writes the tarball to stdout.
pub fn tar_args(cfg: &Config, manifest: &Path) -> Vec<String> {
    vec![
        path_arg(&cfg.tools.tar),
        "-c".into(),
        "-f".into(),
        "-".into(),
        format!("--files-from={}", manifest.display()),
    ]
}

/// `gpg --symmetric …` reading the tarball on stdin and writing `target`.
///
/// Compression is disabled (`--compress-algo 0`); loopback pinentry lets
/// gpg2 accept the passphrase non-interactively.
pub fn gpg_args(cfg: &Config, password: &str, target: &Path) -> Vec<String> {
    vec![
        path_arg(&cfg.tools.gpg),
        "--batch".into(),
        "--yes".into(),
        "--symmetric".into(),
        "--pinentry-mode".into(),
        "loopback".into(),
        "--passphrase".into(),
        password.into(),
        "--compress-algo".into(),
        "0".into(),
        "--cipher-algo".into(),
        "AES256".into(),
        "--output".into(),
        path_arg(target),
    ]
}

/// The archive command as it may be shown to a human: the passphrase is
/// masked.
pub fn archive_display(cfg: &Config, manifest: &Path, password: &str, target: &Path) -> String {
    let tar = tar_args(cfg, manifest).join(" ");
    let gpg = gpg_args(cfg, password, target)
        .into_iter()
        .map(|a| if a == password { "***".to_string() } else { a })
        .collect::<Vec<_>>()
        .join(" ");
    format!("{tar} | {gpg}")
}

// ─── Upload ───────────────────────────────────────────────────────────────────

/// `<uploader> delete <remote_dir>`
pub fn uploader_delete_args(cfg: &Config, remote_dir: &str) -> Vec<String> {
    vec![
        path_arg(&cfg.tools.uploader),
        "delete".into(),
        remote_dir.into(),
    ]
}

/// `<uploader> mkdir <remote_dir>`
pub fn uploader_mkdir_args(cfg: &Config, remote_dir: &str) -> Vec<String> {
    vec![
        path_arg(&cfg.tools.uploader),
        "mkdir".into(),
        remote_dir.into(),
    ]
}

/// `<uploader> upload <local> <remote_file>`
pub fn uploader_upload_args(cfg: &Config, local: &Path, remote_file: &str) -> Vec<String> {
    vec![
        path_arg(&cfg.tools.uploader),
        "upload".into(),
        path_arg(local),
        remote_file.into(),
    ]
}

// ─── Hooks ────────────────────────────────────────────────────────────────────

/// `<shell> -c <command>` — hooks are shell snippets written by the operator.
pub fn hook_args(cfg: &Config, command: &str) -> Vec<String> {
    vec![path_arg(&cfg.tools.shell), "-c".into(), command.into()]
}

// ─── Tests ────────────────────────────────────────────────────────────────────
