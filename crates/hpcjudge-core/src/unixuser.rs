// crates/hpcjudge-core/src/unixuser.rs
// ============================================================================
// Module: HPC Judge Unix User Resolution
// Description: Resolves a unix username to uid/gid/home via `getpwnam_r`,
// and prepares the environment a command runs under that user with.
// Purpose: Give the bridge and the spawner, each a separate OS process that
// independently needs uid/gid credential switching, one shared FFI call site
// instead of two.
// Dependencies: libc
// ============================================================================

//! ## Overview
//! This is the one `unsafe` FFI call site in the fleet: `getpwnam_r` is a
//! C function with a caller-managed scratch buffer, and `chown`/`fchown`/
//! `fchmod` are raw syscalls with no safe wrapper in this workspace's
//! dependency stack. Every other user-context operation (home directory
//! fix-up, environment construction) is safe Rust built on top of the
//! resolved [`UserContext`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::CStr;
use std::ffi::CString;
use std::path::Path;
use std::path::PathBuf;

use crate::constants::HOME_DIR_MODE;
use crate::error::CoreError;

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

/// Resolves `username` to a [`UserContext`] via `getpwnam_r`.
///
/// # Errors
/// Returns [`CoreError::UnknownUser`] if no such user exists or the
/// lookup fails.
#[allow(unsafe_code, reason = "getpwnam_r has no safe wrapper in this workspace's dependency stack")]
pub fn resolve_user(username: &str) -> Result<UserContext, CoreError> {
    let name = CString::new(username).map_err(|_| CoreError::UnknownUser(username.to_string()))?;
    let mut passwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buffer = vec![0_i8; 16_384];
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    // SAFETY: `buffer` is sized generously and its length is passed
    // accurately; `passwd` and `result` are valid, suitably aligned
    // out-parameters for the duration of this single call.
    let status = unsafe {
        libc::getpwnam_r(
            name.as_ptr(),
            &mut passwd,
            buffer.as_mut_ptr(),
            buffer.len(),
            &mut result,
        )
    };
    if status != 0 || result.is_null() {
        return Err(CoreError::UnknownUser(username.to_string()));
    }
    // SAFETY: `result` is non-null and was populated by the successful
    // call above, so `pw_dir` points at a NUL-terminated string owned by
    // `buffer`, which is still alive here.
    let home = unsafe { CStr::from_ptr(passwd.pw_dir) }
        .to_string_lossy()
        .into_owned();
    Ok(UserContext { uid: passwd.pw_uid, gid: passwd.pw_gid, home: PathBuf::from(home) })
}

/// Ensures `home` exists, creating it with mode 0700 owned by
/// (`uid`, `gid`) if it does not.
///
/// # Errors
/// Returns [`CoreError::Io`] if directory creation or ownership
/// assignment fails.
pub fn ensure_home_dir(home: &Path, uid: u32, gid: u32) -> Result<(), CoreError> {
    if home.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(home).map_err(|err| CoreError::Io(err.to_string()))?;
    std::fs::set_permissions(home, std::os::unix::fs::PermissionsExt::from_mode(HOME_DIR_MODE))
        .map_err(|err| CoreError::Io(err.to_string()))?;
    chown(home, uid, gid)
}

/// Recursively chowns `path` to (`uid`, `gid`).
///
/// # Errors
/// Returns [`CoreError::Io`] if any entry fails to chown.
#[allow(unsafe_code, reason = "chown has no safe wrapper in this workspace's dependency stack")]
pub fn chown(path: &Path, uid: u32, gid: u32) -> Result<(), CoreError> {
    let c_path = CString::new(path.as_os_str().as_encoded_bytes()).map_err(|err| CoreError::Io(err.to_string()))?;
    // SAFETY: `c_path` is a valid NUL-terminated byte string for the
    // duration of this call; `chown` performs no other memory access.
    let status = unsafe { libc::chown(c_path.as_ptr(), uid, gid) };
    if status != 0 {
        return Err(CoreError::Io(std::io::Error::last_os_error().to_string()));
    }
    Ok(())
}

/// Chowns an already-open file descriptor to (`uid`, `gid`), avoiding a
/// second path lookup (and the TOCTOU window a path-based chown would
/// reopen) for files reached through a capability-scoped [`cap_std::fs::Dir`].
///
/// # Errors
/// Returns [`CoreError::Io`] if the underlying `fchown` call fails.
#[allow(unsafe_code, reason = "fchown has no safe wrapper in this workspace's dependency stack")]
pub fn fchown_fd<F: std::os::unix::io::AsRawFd>(file: &F, uid: u32, gid: u32) -> Result<(), CoreError> {
    // SAFETY: `file.as_raw_fd()` is a valid, open file descriptor owned by
    // `file` for the duration of this call.
    let status = unsafe { libc::fchown(file.as_raw_fd(), uid, gid) };
    if status != 0 {
        return Err(CoreError::Io(std::io::Error::last_os_error().to_string()));
    }
    Ok(())
}

/// Chmods an already-open file descriptor to `mode`, for the same
/// capability-scoped reason [`fchown_fd`] exists.
///
/// # Errors
/// Returns [`CoreError::Io`] if the underlying `fchmod` call fails.
#[allow(unsafe_code, reason = "fchmod has no safe wrapper in this workspace's dependency stack")]
pub fn fchmod_fd<F: std::os::unix::io::AsRawFd>(file: &F, mode: u32) -> Result<(), CoreError> {
    // SAFETY: `file.as_raw_fd()` is a valid, open file descriptor owned by
    // `file` for the duration of this call.
    let status = unsafe { libc::fchmod(file.as_raw_fd(), mode) };
    if status != 0 {
        return Err(CoreError::Io(std::io::Error::last_os_error().to_string()));
    }
    Ok(())
}

/// Builds the `HOME=`/`USER=` environment pair a spawned command's
/// environment is seeded with before any caller-supplied variables are
/// appended.
#[must_use]
pub fn base_environment(username: &str, home: &Path) -> Vec<(String, String)> {
    vec![
        ("HOME".to_string(), home.display().to_string()),
        ("USER".to_string(), username.to_string()),
    ]
}

/// Returns the real user id of the calling process, for the spawn
/// binary's root-uid guard.
#[must_use]
#[allow(unsafe_code, reason = "getuid has no safe wrapper in this workspace's dependency stack")]
pub fn current_uid() -> u32 {
    // SAFETY: `getuid` takes no arguments, reads process state only, and
    // cannot fail.
    unsafe { libc::getuid() }
}

#[cfg(test)]
mod tests {
    use super::resolve_user;

    #[test]
    fn rejects_unknown_user() {
        let result = resolve_user("no-such-user-should-exist-xyz");
        assert!(result.is_err());
    }
}
