// crates/hpcjudge-spawner/src/error.rs
// ============================================================================
// Module: HPC Judge Spawner Errors
// Description: Error vocabulary for cgroup management, template rendering,
// status-file lifecycle, and the run-judge-script orchestration.
// Purpose: Give every spawner failure mode a stable, matchable variant.
// Dependencies: thiserror, hpcjudge-core
// ============================================================================

/// Failure modes surfaced by the sandbox spawner.
#[derive(Debug, thiserror::Error)]
pub enum SpawnerError {
    /// The requested unix user could not be resolved.
    #[error("unknown user: {0}")]
    UnknownUser(String),
    /// A filesystem operation (stage, chown, chmod, remove) failed.
    #[error("io error: {0}")]
    Io(String),
    /// Creating, attaching to, or deleting a cgroup failed.
    #[error("cgroup error: {0}")]
    Cgroup(String),
    /// The judge entrance failed to spawn at all.
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    /// The judge-status file could not be serialised or written.
    #[error("status file error: {0}")]
    Status(String),
    /// `RunJudgeScriptData` failed to parse from the supplied JSON.
    #[error("malformed run-judge-script data: {0}")]
    MalformedData(String),
}

impl From<hpcjudge_core::CoreError> for SpawnerError {
    fn from(err: hpcjudge_core::CoreError) -> Self {
        match err {
            hpcjudge_core::CoreError::UnknownUser(name) => Self::UnknownUser(name),
            hpcjudge_core::CoreError::Io(detail) => Self::Io(detail),
            hpcjudge_core::CoreError::PathOverflowsPartition => Self::Io("path overflows partition".to_string()),
            hpcjudge_core::CoreError::UnknownPartition(name) => Self::Io(format!("unknown partition: {name}")),
            hpcjudge_core::CoreError::InvalidRelativePath(path) => Self::Io(format!("invalid relative path: {}", path.display())),
        }
    }
}
