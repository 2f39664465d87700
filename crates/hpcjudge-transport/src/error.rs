// crates/hpcjudge-transport/src/error.rs
// ============================================================================
// Module: HPC Judge Transport Errors
// Description: Error vocabulary for signing, verification, and the HTTP
// call itself.
// Purpose: Distinguish "we couldn't reach anyone" from "the signature was
// wrong" from "nobody answered".
// Dependencies: thiserror
// ============================================================================

/// Failure modes surfaced by the signed transport contract.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request or response body did not match its signature (P7).
    #[error("signature mismatch")]
    SignatureMismatch,
    /// A signed request arrived with no `X-Signature` header at all.
    #[error("missing signature header")]
    MissingSignature,
    /// Every candidate address failed; the inner error is the last one
    /// observed.
    #[error("all candidate addresses failed: {0}")]
    AllAddressesFailed(String),
    /// No candidate address was configured at all.
    #[error("no candidate address configured")]
    NoAddressConfigured,
    /// The underlying HTTP transport failed.
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response body did not deserialize as expected.
    #[error("response decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// Resolving an address through discovery failed.
    #[error("discovery error: {0}")]
    Discovery(#[from] hpcjudge_discovery::DiscoveryError),
    /// The configured secret could not be used to construct an HMAC
    /// instance. Not observed in practice — `Hmac<Sha256>` accepts a key
    /// of any length — but surfaced rather than assumed.
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),
}
