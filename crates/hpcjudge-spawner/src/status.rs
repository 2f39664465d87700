// crates/hpcjudge-spawner/src/status.rs
// ============================================================================
// Module: HPC Judge Status File Lifecycle
// Description: Writes, rewrites, and clears the `<username>.judge.json`
// status file the utility CLI reads to learn the current submission.
// Purpose: Give the spawner one place that owns the file's mode (0600) and
// ownership (root:root), matching the Go `WriteStatus`/`ClearStatus`.
// Dependencies: hpcjudge-core, serde_json
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use hpcjudge_core::constants::JUDGE_STATUS_FILE_MODE;
use hpcjudge_core::unixuser;
use hpcjudge_core::JudgeStatus;
use uuid::Uuid;

use crate::error::SpawnerError;

/// Returns `<status-root>/<username>.judge.json`.
#[must_use]
pub fn status_file_path(status_root: &Path, username: &str) -> PathBuf {
    status_root.join(format!("{username}.judge.json"))
}

/// Writes (or rewrites) the status file for `username`, root-owned at mode
/// 0600.
///
/// # Errors
/// Returns [`SpawnerError::Status`] if serialisation fails, or
/// [`SpawnerError::Io`] if the write, chmod, or chown fails.
pub fn write_status(
    status_root: &Path,
    username: &str,
    problem_id: &str,
    solution_id: Uuid,
    entrance_pid: i64,
    problem_stored_to: &Path,
) -> Result<(), SpawnerError> {
    let status = JudgeStatus {
        problem_id: problem_id.to_string(),
        solution_id,
        entrance_pid,
        problem_stored_to: problem_stored_to.to_path_buf(),
        username: username.to_string(),
    };
    let body = serde_json::to_vec(&status).map_err(|err| SpawnerError::Status(err.to_string()))?;
    let path = status_file_path(status_root, username);
    std::fs::write(&path, body).map_err(|err| SpawnerError::Io(err.to_string()))?;
    std::fs::set_permissions(&path, std::os::unix::fs::PermissionsExt::from_mode(JUDGE_STATUS_FILE_MODE))
        .map_err(|err| SpawnerError::Io(err.to_string()))?;
    unixuser::chown(&path, 0, 0)?;
    Ok(())
}

/// Removes the status file for `username`, if present.
///
/// # Errors
/// Returns [`SpawnerError::Io`] if removal fails for a reason other than
/// the file already being absent.
pub fn clear_status(status_root: &Path, username: &str) -> Result<(), SpawnerError> {
    let path = status_file_path(status_root, username);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SpawnerError::Io(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests use expect on deterministic fixtures.")]

    use std::path::Path;

    use uuid::Uuid;

    use super::clear_status;
    use super::write_status;

    #[test]
    fn writes_then_clears_status_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_status(dir.path(), "judge-sol-1", "prob-1", Uuid::nil(), -1, Path::new("/srv/problem/prob-1")).expect("write");
        let path = dir.path().join("judge-sol-1.judge.json");
        assert!(path.exists());
        clear_status(dir.path(), "judge-sol-1").expect("clear");
        assert!(!path.exists());
    }
}
