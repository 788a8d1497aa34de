//! Facts about the machine we are running on.
//!
//! Both values are read once at startup through `libc` and carried around in
//! a [`Host`]; the pipeline never asks the OS again.

use std::io;

use anyhow::{Context, Result};

use crate::config::Config;

/// Hostname and effective identity of the current process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    /// Used as the per-machine folder in the remote layout.
    pub hostname: String,
    /// Effective user id; `0` means root.
    pub euid: u32,
}

impl Host {
    /// Detect the current host, honouring `[remote].host` when set.
    pub fn detect(cfg: &Config) -> Result<Self> {
        let hostname = match &cfg.remote.host {
            Some(h) => h.clone(),
            None => hostname().context("reading hostname")?,
        };

        Ok(Self {
            hostname,
            euid: effective_uid(),
        })
    }

    /// Archiving arbitrary system paths requires root.
    pub const fn is_privileged(&self) -> bool {
        self.euid == 0
    }
}

/// Wraps a return value from a `libc` function into an `io::Result`.
fn check_error(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(ret)
}

/// A safe wrapper for `libc::gethostname`.
pub fn hostname() -> io::Result<String> {
    let mut buf = [0u8; 256];
    check_error(unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) })?;

    // POSIX does not guarantee termination on truncation.
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

/// A safe wrapper for `libc::geteuid`.
pub fn effective_uid() -> u32 {
    // geteuid(2) cannot fail.
    unsafe { libc::geteuid() }
}
