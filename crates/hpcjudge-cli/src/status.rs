// crates/hpcjudge-cli/src/status.rs
// ============================================================================
// Module: HPC Judge Status File Lookup
// Description: Read-only counterpart to `hpcjudge_spawner::status`: locates
// and parses the judge-status file for the current user.
// Purpose: Give every subcommand the submission context (problem id,
// solution id, staged problem directory) without re-deriving it.
// Dependencies: hpcjudge-core, serde_json
// ============================================================================

use std::path::Path;

use hpcjudge_core::JudgeStatus;

use crate::error::CliError;

/// Returns `<status-root>/<username>.judge.json`, matching
/// `hpcjudge_spawner::status::status_file_path` exactly (same file, read
/// instead of written).
#[must_use]
pub fn status_file_path(status_root: &Path, username: &str) -> std::path::PathBuf {
    status_root.join(format!("{username}.judge.json"))
}

/// Reads and parses the judge-status file for `username`.
///
/// # Errors
/// Returns [`CliError::StatusUnavailable`] if the file cannot be read, or
/// [`CliError::MalformedStatus`] if it does not parse.
pub fn read_status(status_root: &Path, username: &str) -> Result<JudgeStatus, CliError> {
    let path = status_file_path(status_root, username);
    let body = std::fs::read(&path).map_err(|err| CliError::StatusUnavailable(err.to_string()))?;
    serde_json::from_slice(&body).map_err(|err| CliError::MalformedStatus(err.to_string()))
}
