// crates/hpcjudge-cli/src/error.rs
// ============================================================================
// Module: HPC Judge Utility CLI Errors
// Description: Error vocabulary for status-file lookup, path classification,
// masking, and bridge uploads.
// Purpose: Give every CLI failure mode a stable, matchable variant instead
// of ad-hoc string formatting at each call site.
// Dependencies: thiserror, hpcjudge-core, hpcjudge-transport
// ============================================================================

/// Failure modes surfaced by `hpcjudge-cli`.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The invoking process has no `USER` environment variable to identify
    /// the current judge status file with.
    #[error("USER environment variable is not set")]
    MissingUser,
    /// The judge-status file for the current user could not be read.
    #[error("failed to read judge status file: {0}")]
    StatusUnavailable(String),
    /// The judge-status file did not parse as JSON.
    #[error("malformed judge status file: {0}")]
    MalformedStatus(String),
    /// A supplied path did not resolve inside any configured partition (P3).
    #[error("path-overflows-partition-path")]
    PathOverflowsPartition,
    /// A supplied path resolved to a partition other than the one the
    /// operation is scoped to.
    #[error("path is not within the {0} partition")]
    WrongPartition(&'static str),
    /// A relative subpath argument contained a parent-directory component.
    #[error("subpath must not contain a parent-directory component")]
    SubpathEscapes,
    /// The referenced partition is not configured.
    #[error("unknown partition: {0}")]
    UnknownPartition(String),
    /// A local filesystem operation (open, chown, chmod) failed.
    #[error("io error: {0}")]
    Io(String),
    /// The bridge call failed at the transport layer.
    #[error("bridge call failed: {0}")]
    Transport(#[from] hpcjudge_transport::TransportError),
}

impl From<hpcjudge_core::CoreError> for CliError {
    fn from(err: hpcjudge_core::CoreError) -> Self {
        match err {
            hpcjudge_core::CoreError::PathOverflowsPartition => Self::PathOverflowsPartition,
            hpcjudge_core::CoreError::UnknownPartition(name) => Self::UnknownPartition(name),
            hpcjudge_core::CoreError::Io(detail) => Self::Io(detail),
            hpcjudge_core::CoreError::InvalidRelativePath(path) => Self::Io(format!("invalid relative path: {}", path.display())),
            hpcjudge_core::CoreError::UnknownUser(name) => Self::Io(format!("unknown unix user: {name}")),
        }
    }
}
