// crates/hpcjudge-discovery/src/protocol.rs
// ============================================================================
// Module: HPC Judge Discovery Wire Protocol
// Description: Tagged message shapes for the peer endpoint and the
// long-lived register channel.
// Purpose: Give the HTTP/WS surface one canonical set of request/response
// types instead of ad-hoc JSON per handler.
// Dependencies: serde, hpcjudge-core
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use hpcjudge_core::QueryParameters;
use hpcjudge_core::Service;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Peer Endpoint (`POST /peer`)
// ============================================================================

/// A node-to-node mutation or sync request against `/peer`.
///
/// `propagate = false` marks a mutation that arrived FROM a peer: the
/// receiving node applies it locally without re-broadcasting, which is
/// what breaks fanout cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum PeerOperation {
    /// Apply a service addition.
    AddService {
        /// The service to add.
        service: Service,
    },
    /// Apply a service deletion.
    DeleteService {
        /// The service id to remove.
        id: hpcjudge_core::ServiceId,
    },
    /// Request the full service list, used during bootstrap.
    ListServices,
    /// Request the full peer list, used during bootstrap.
    ListPeers,
    /// Keepalive; no state change.
    Noop,
}

/// Response to a [`PeerOperation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error detail when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Populated by `ListServices`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<Service>>,
    /// Populated by `ListPeers`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<Vec<String>>,
}

// ============================================================================
// SECTION: Register Channel (`WS /register`)
// ============================================================================

/// A message sent by a service over its long-lived register session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum RegisterMessage {
    /// Assert an intent to register; the server normalises and assigns or
    /// recovers an id.
    Inform {
        /// The service record to normalise (id is ignored on input).
        service: Service,
    },
    /// Commit the previously informed service to the registry.
    Add,
    /// Remove the previously informed service from the registry.
    Delete,
    /// Ask whether the previously informed id is currently registered.
    Has,
    /// Keepalive; no state change.
    Noop,
}

/// Acknowledgement sent back for every [`RegisterMessage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAck {
    /// Whether the requested operation succeeded.
    pub success: bool,
    /// Error detail when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Populated by `Inform`: the normalised service record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Service>,
    /// Populated by `Has`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has: Option<bool>,
}

/// Request body for `POST /add`, `/delete`, `/query`, `/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The filter to apply.
    #[serde(flatten)]
    pub params: QueryParameters,
}

/// Response body for `POST|GET /list`.
///
/// A bare `Vec<Service>` cannot be flattened into [`hpcjudge_core::ResponseEnvelope`]
/// (flatten requires a map-shaped value, not a sequence), so `/list` gets
/// its own named-field envelope instead, matching [`PeerResponse`]'s shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    /// Whether the query succeeded (always `true`; `list` cannot fail).
    pub success: bool,
    /// The matching services.
    pub services: Vec<Service>,
}

/// Response body for `POST /peers/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeersListResponse {
    /// Whether the query succeeded (always `true`; `peers/list` cannot fail).
    pub success: bool,
    /// The current peer list.
    pub peers: Vec<String>,
}
