// crates/hpcjudge-orchestrator/src/error.rs
// ============================================================================
// Module: HPC Judge Orchestrator Errors
// Description: Error vocabulary for the queue consumer, the three event
// watchers, and the KV lock / object-store collaborators they share.
// Purpose: Give `ProcessJudge` and every watcher one stable failure
// vocabulary instead of ad-hoc strings, and let the §7 error-kind taxonomy
// (validation/authentication/transport/capacity/business) map onto named
// variant groups.
// Dependencies: thiserror, redis, aws-sdk-s3, hpcjudge-core, hpcjudge-transport
// ============================================================================

/// Failure modes surfaced by the judge orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The inbound queue message did not parse as a [`hpcjudge_core::JudgeMessage`].
    #[error("malformed judge message: {0}")]
    MalformedMessage(String),
    /// No bridge in the discovery mesh satisfied the problem's routing tags.
    #[error("no bridge available: {0}")]
    NoBridgeAvailable(#[from] hpcjudge_discovery::DiscoveryError),
    /// The problem descriptor could not be fetched or did not parse as TOML.
    #[error("problem descriptor error: {0}")]
    ProblemDescriptor(String),
    /// A bridge call (fetch-object, execute-command, ...) failed.
    #[error("bridge call failed: {0}")]
    Bridge(#[from] hpcjudge_transport::TransportError),
    /// The object store rejected a get/put/list/presign request.
    #[error("object store error: {0}")]
    ObjectStore(String),
    /// The KV lock backend (redis) is unreachable. Per the capacity error
    /// kind (§7), callers treat this the same as "lock already held" —
    /// refuse to double-run rather than risk a duplicate dispatch.
    #[error("kv lock unavailable: {0}")]
    KvLockUnavailable(#[from] redis::RedisError),
    /// A command-report or judge-result object did not parse as expected
    /// JSON.
    #[error("malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    /// An uploaded problem archive had no `problem.toml` entry.
    #[error("problem archive missing problem.toml: {0}")]
    MissingProblemDescriptor(String),
    /// Reading or walking a problem archive tarball failed.
    #[error("problem archive error: {0}")]
    ProblemArchive(String),
}

impl From<hpcjudge_core::CoreError> for OrchestratorError {
    fn from(err: hpcjudge_core::CoreError) -> Self {
        Self::ObjectStore(err.to_string())
    }
}
