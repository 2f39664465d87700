// crates/hpcjudge-core/src/envelope.rs
// ============================================================================
// Module: HPC Judge Response Envelope
// Description: The universal success/error wrapper used by the discovery
// and bridge HTTP surfaces.
// Purpose: Mirror the Go `ResponseBase{Success,Error}` convention so callers
// never receive a bare 5xx with no body.
// Dependencies: serde
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Wraps a successful payload or an error string, matching the wire shape
/// every HTTP endpoint in the fleet returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error detail when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Payload fields, flattened into the envelope on success.
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ResponseEnvelope<T> {
    /// Builds a success envelope carrying `data`.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    /// Builds an error envelope carrying no payload.
    #[must_use]
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            data: None,
        }
    }
}

impl ResponseEnvelope<()> {
    /// Builds a bare success envelope with no payload.
    #[must_use]
    pub const fn ok_empty() -> Self {
        Self {
            success: true,
            error: None,
            data: None,
        }
    }
}
