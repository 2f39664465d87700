// crates/hpcjudge-discovery/src/error.rs
// ============================================================================
// Module: HPC Judge Discovery Errors
// Description: Error vocabulary for the registry, the peer fanout, and the
// client-facing query surface.
// Purpose: Give every discovery failure mode a stable, matchable variant.
// Dependencies: thiserror
// ============================================================================

/// Failure modes surfaced by the discovery registry or its HTTP/client
/// surfaces.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// `query`/`query_one` found no candidate matching the filter.
    #[error("no-service-available")]
    NoServiceAvailable,
    /// `add` (or `inform` immediately followed by `add`) targeted a service
    /// whose id is already registered.
    #[error("service-already-exists")]
    ServiceAlreadyExists,
    /// `delete` targeted a service id that is not currently registered.
    #[error("service-does-not-exist")]
    ServiceDoesNotExist,
    /// The access key supplied by the caller did not match the configured
    /// key.
    #[error("invalid access key")]
    InvalidAccessKey,
    /// A peer call failed (connection refused, timeout, bad response).
    /// Never surfaced to the originator of a propagated mutation; logged
    /// via the operational sink instead.
    #[error("peer request failed: {0}")]
    PeerRequestFailed(String),
    /// The local HTTP transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// A WebSocket register-channel message failed to parse.
    #[error("malformed register message: {0}")]
    MalformedMessage(#[from] serde_json::Error),
    /// The register channel's underlying WebSocket connection failed.
    #[error("register channel transport error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// The register channel closed before an expected acknowledgement
    /// arrived.
    #[error("register channel closed unexpectedly")]
    RegisterChannelClosed,
}
