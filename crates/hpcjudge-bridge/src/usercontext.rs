// crates/hpcjudge-bridge/src/usercontext.rs
// ============================================================================
// Module: HPC Judge Bridge User Context
// Description: Thin wrapper over `hpcjudge_core::unixuser`, translating its
// `CoreError` into `BridgeError` so existing call sites keep their error type.
// Purpose: The bridge and the spawner are separate OS processes that both
// need uid/gid credential resolution; the FFI itself lives once in
// `hpcjudge-core`.
// Dependencies: hpcjudge-core
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use hpcjudge_core::unixuser;

use crate::error::BridgeError;

// ============================================================================
// SECTION: User Context
// ============================================================================

/// The uid/gid/home a command runs under when invoked as a given unix
/// user.
#[derive(Debug, Clone)]
pub struct UserContext {
    /// Resolved user id.
    pub uid: u32,
    /// Resolved primary group id.
    pub gid: u32,
    /// Resolved home directory.
    pub home: PathBuf,
}

impl From<unixuser::UserContext> for UserContext {
    fn from(context: unixuser::UserContext) -> Self {
        Self { uid: context.uid, gid: context.gid, home: context.home }
    }
}

/// Resolves `username` to a [`UserContext`] via `getpwnam_r`.
///
/// # Errors
/// Returns [`BridgeError::UnknownUser`] if no such user exists or the
/// lookup fails.
pub fn resolve_user(username: &str) -> Result<UserContext, BridgeError> {
    Ok(unixuser::resolve_user(username)?.into())
}

/// Ensures `home` exists, creating it with mode 0700 owned by
/// (`uid`, `gid`) if it does not.
///
/// # Errors
/// Returns [`BridgeError::Io`] if directory creation or ownership
/// assignment fails.
pub fn ensure_home_dir(home: &Path, uid: u32, gid: u32) -> Result<(), BridgeError> {
    unixuser::ensure_home_dir(home, uid, gid).map_err(Into::into)
}

/// Recursively chowns `path` to (`uid`, `gid`).
///
/// # Errors
/// Returns [`BridgeError::Io`] if any entry fails to chown.
pub fn chown(path: &Path, uid: u32, gid: u32) -> Result<(), BridgeError> {
    unixuser::chown(path, uid, gid).map_err(Into::into)
}

/// Chowns an already-open file descriptor to (`uid`, `gid`), avoiding a
/// second path lookup (and the TOCTOU window a path-based chown would
/// reopen) for files reached through a capability-scoped [`cap_std::fs::Dir`].
///
/// # Errors
/// Returns [`BridgeError::Io`] if the underlying `fchown` call fails.
pub fn fchown_fd<F: std::os::unix::io::AsRawFd>(file: &F, uid: u32, gid: u32) -> Result<(), BridgeError> {
    unixuser::fchown_fd(file, uid, gid).map_err(Into::into)
}

/// Chmods an already-open file descriptor to `mode`, for the same
/// capability-scoped reason [`fchown_fd`] exists.
///
/// # Errors
/// Returns [`BridgeError::Io`] if the underlying `fchmod` call fails.
pub fn fchmod_fd<F: std::os::unix::io::AsRawFd>(file: &F, mode: u32) -> Result<(), BridgeError> {
    unixuser::fchmod_fd(file, mode).map_err(Into::into)
}

/// Builds the `HOME=`/`USER=` environment pair a spawned command's
/// environment is seeded with before any caller-supplied variables are
/// appended.
#[must_use]
pub fn base_environment(username: &str, home: &Path) -> Vec<(String, String)> {
    unixuser::base_environment(username, home)
}
