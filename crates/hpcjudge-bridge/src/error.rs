// crates/hpcjudge-bridge/src/error.rs
// ============================================================================
// Module: HPC Judge Bridge Errors
// Description: Error vocabulary for partition resolution, user-context
// resolution, and command execution.
// Purpose: Give every bridge operation a stable, matchable failure mode so
// the response envelope's `error` string is never an ad-hoc format!().
// Dependencies: thiserror, hpcjudge-core
// ============================================================================

/// Failure modes surfaced by a bridge operation.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A partition-qualified path failed to resolve within its root (P3).
    #[error("path-overflows-partition-path")]
    PathOverflowsPartition,
    /// The referenced partition is not configured on this bridge.
    #[error("unknown-partition: {0}")]
    UnknownPartition(String),
    /// The requested unix user could not be resolved.
    #[error("unknown-user: {0}")]
    UnknownUser(String),
    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(String),
    /// Fetching the source URL failed or was truncated.
    #[error("fetch failed: {0}")]
    FetchFailed(String),
    /// The object-store upload failed.
    #[error("upload failed: {0}")]
    UploadFailed(String),
    /// Spawning the requested command failed.
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    /// Delivering an async command's report to its callback URL failed.
    #[error("report delivery failed: {0}")]
    ReportDeliveryFailed(String),
    /// A signed request arrived with no `X-Signature` header at all.
    #[error("missing signature header")]
    MissingSignature,
    /// The request body did not match its `X-Signature` header (P7).
    #[error("signature mismatch")]
    SignatureMismatch,
    /// The request body did not parse as the expected JSON shape.
    #[error("malformed request body: {0}")]
    MalformedRequest(String),
    /// The configured HMAC secret could not be used to verify a signature.
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),
}

impl From<hpcjudge_core::CoreError> for BridgeError {
    fn from(err: hpcjudge_core::CoreError) -> Self {
        match err {
            hpcjudge_core::CoreError::UnknownPartition(name) => Self::UnknownPartition(name),
            hpcjudge_core::CoreError::PathOverflowsPartition => Self::PathOverflowsPartition,
            hpcjudge_core::CoreError::Io(detail) => Self::Io(detail),
            hpcjudge_core::CoreError::InvalidRelativePath(path) => Self::Io(format!("invalid relative path: {}", path.display())),
            hpcjudge_core::CoreError::UnknownUser(name) => Self::UnknownUser(name),
        }
    }
}
