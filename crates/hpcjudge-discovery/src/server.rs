// crates/hpcjudge-discovery/src/server.rs
// ============================================================================
// Module: HPC Judge Discovery HTTP/WS Surface
// Description: axum router wiring the registry to `/add`, `/delete`,
// `/query`, `/list`, `/peer`, `/peers/list`, `/peers/remove`, `WS /register`.
// Purpose: Translate wire requests into registry operations and enforce
// the access-key check on every entry point.
// Dependencies: axum, hpcjudge-core
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use hpcjudge_core::QueryParameters;
use hpcjudge_core::ResponseEnvelope;
use hpcjudge_core::Service;
use hpcjudge_core::ServiceId;
use serde::Deserialize;

use crate::protocol::ListResponse;
use crate::protocol::PeerOperation;
use crate::protocol::PeersListResponse;
use crate::protocol::QueryRequest;
use crate::protocol::RegisterAck;
use crate::protocol::RegisterMessage;
use crate::registry::Registry;
use crate::sink::EventKind;
use crate::sink::OperationalEvent;

/// Query-string form of the access key (`?access-key=...`).
#[derive(Debug, Deserialize)]
struct AccessKeyParam {
    #[serde(rename = "access-key", default)]
    access_key: String,
}

/// Builds the full discovery HTTP/WS router over `registry`.
#[must_use]
pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/add", post(handle_add))
        .route("/delete", post(handle_delete))
        .route("/query", post(handle_query))
        .route("/list", post(handle_list).get(handle_list))
        .route("/peer", post(handle_peer))
        .route("/peers/list", post(handle_peers_list))
        .route("/peers/remove", post(handle_peers_remove))
        .route("/register", get(handle_register))
        .with_state(registry)
}

fn authorized(registry: &Registry, headers: &HeaderMap, query_key: &str) -> bool {
    let header_key = headers
        .get("X-Access-Key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    registry.check_access_key(header_key) || registry.check_access_key(query_key)
}

fn deny(registry: &Registry) -> Response {
    registry.sink_access_denied();
    (StatusCode::FORBIDDEN, Json(ResponseEnvelope::<()>::err("invalid access key"))).into_response()
}

impl Registry {
    fn sink_access_denied(&self) {
        self.sink().record(OperationalEvent { kind: EventKind::AccessDenied, detail: String::new() });
    }
}

async fn handle_add(
    State(registry): State<Arc<Registry>>,
    headers: HeaderMap,
    Query(key): Query<AccessKeyParam>,
    Json(service): Json<Service>,
) -> Response {
    if !authorized(&registry, &headers, &key.access_key) {
        return deny(&registry);
    }
    match registry.add(service).await {
        Ok(()) => Json(ResponseEnvelope::ok_empty()).into_response(),
        Err(err) => Json(ResponseEnvelope::<()>::err(err.to_string())).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    id: ServiceId,
}

async fn handle_delete(
    State(registry): State<Arc<Registry>>,
    headers: HeaderMap,
    Query(key): Query<AccessKeyParam>,
    Json(request): Json<DeleteRequest>,
) -> Response {
    if !authorized(&registry, &headers, &key.access_key) {
        return deny(&registry);
    }
    match registry.delete(request.id).await {
        Ok(()) => Json(ResponseEnvelope::ok_empty()).into_response(),
        Err(err) => Json(ResponseEnvelope::<()>::err(err.to_string())).into_response(),
    }
}

async fn handle_query(
    State(registry): State<Arc<Registry>>,
    headers: HeaderMap,
    Query(key): Query<AccessKeyParam>,
    Json(request): Json<QueryRequest>,
) -> Response {
    if !authorized(&registry, &headers, &key.access_key) {
        return deny(&registry);
    }
    match registry.query_one(&request.params) {
        Ok(service) => Json(ResponseEnvelope::ok(service)).into_response(),
        Err(err) => Json(ResponseEnvelope::<Service>::err(err.to_string())).into_response(),
    }
}

async fn handle_list(
    State(registry): State<Arc<Registry>>,
    headers: HeaderMap,
    Query(key): Query<AccessKeyParam>,
    body: Option<Json<QueryRequest>>,
) -> Response {
    if !authorized(&registry, &headers, &key.access_key) {
        return deny(&registry);
    }
    let params = body.map(|Json(request)| request.params).unwrap_or_default();
    Json(ListResponse { success: true, services: registry.list(&params) }).into_response()
}

async fn handle_peer(
    State(registry): State<Arc<Registry>>,
    headers: HeaderMap,
    Query(key): Query<AccessKeyParam>,
    Json(operation): Json<PeerOperation>,
) -> Response {
    if !authorized(&registry, &headers, &key.access_key) {
        return deny(&registry);
    }
    match registry.apply_peer_operation(operation) {
        Ok(response) => Json(response).into_response(),
        Err(err) => Json(ResponseEnvelope::<()>::err(err.to_string())).into_response(),
    }
}

async fn handle_peers_list(
    State(registry): State<Arc<Registry>>,
    headers: HeaderMap,
    Query(key): Query<AccessKeyParam>,
) -> Response {
    if !authorized(&registry, &headers, &key.access_key) {
        return deny(&registry);
    }
    Json(PeersListResponse { success: true, peers: registry.peers() }).into_response()
}

#[derive(Debug, Deserialize)]
struct RemovePeerRequest {
    peer: String,
}

async fn handle_peers_remove(
    State(registry): State<Arc<Registry>>,
    headers: HeaderMap,
    Query(key): Query<AccessKeyParam>,
    Json(request): Json<RemovePeerRequest>,
) -> Response {
    if !authorized(&registry, &headers, &key.access_key) {
        return deny(&registry);
    }
    registry.remove_peer(&request.peer);
    Json(ResponseEnvelope::ok_empty()).into_response()
}

async fn handle_register(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<Registry>>,
    headers: HeaderMap,
    Query(key): Query<AccessKeyParam>,
) -> Response {
    if !authorized(&registry, &headers, &key.access_key) {
        return deny(&registry);
    }
    ws.on_upgrade(move |socket| register_session(socket, registry))
}

/// Drives one register channel for its full lifetime. Presence in the
/// registry is bound to the session: dropping the socket for any reason
/// deletes the informed service, matching the reference "delete on
/// disconnect" behaviour.
async fn register_session(mut socket: WebSocket, registry: Arc<Registry>) {
    let mut informed: Option<Service> = None;
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else { continue };
        let Ok(request) = serde_json::from_str::<RegisterMessage>(&text) else {
            let ack = RegisterAck { success: false, error: Some("malformed register message".into()), service: None, has: None };
            if send_ack(&mut socket, &ack).await.is_err() {
                break;
            }
            continue;
        };
        let ack = match request {
            RegisterMessage::Inform { service } => {
                let normalized = registry.normalize(service);
                informed = Some(normalized.clone());
                RegisterAck { success: true, error: None, service: Some(normalized), has: None }
            }
            RegisterMessage::Add => match informed.clone() {
                Some(service) => match registry.add(service).await {
                    Ok(()) => RegisterAck { success: true, error: None, service: None, has: None },
                    Err(err) => RegisterAck { success: false, error: Some(err.to_string()), service: None, has: None },
                },
                None => RegisterAck { success: false, error: Some("inform required before add".into()), service: None, has: None },
            },
            RegisterMessage::Delete => match informed.take() {
                Some(service) => match registry.delete(service.id).await {
                    Ok(()) => RegisterAck { success: true, error: None, service: None, has: None },
                    Err(err) => RegisterAck { success: false, error: Some(err.to_string()), service: None, has: None },
                },
                None => RegisterAck { success: false, error: Some("nothing informed".into()), service: None, has: None },
            },
            RegisterMessage::Has => {
                let has = informed
                    .as_ref()
                    .map(|service| !registry.list(&QueryParameters { id: Some(service.id), ..QueryParameters::default() }).is_empty())
                    .unwrap_or(false);
                RegisterAck { success: true, error: None, service: None, has: Some(has) }
            }
            RegisterMessage::Noop => RegisterAck { success: true, error: None, service: None, has: None },
        };
        if send_ack(&mut socket, &ack).await.is_err() {
            break;
        }
    }
    if let Some(service) = informed {
        let _ = registry.delete(service.id).await;
        registry.sink().record(OperationalEvent { kind: EventKind::RegisterSessionClosed, detail: service.id.to_string() });
    }
}

async fn send_ack(socket: &mut WebSocket, ack: &RegisterAck) -> Result<(), axum::Error> {
    let text = serde_json::to_string(ack).unwrap_or_default();
    socket.send(Message::Text(text.into())).await
}
