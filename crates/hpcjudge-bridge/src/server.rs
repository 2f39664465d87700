// crates/hpcjudge-bridge/src/server.rs
// ============================================================================
// Module: HPC Judge Bridge HTTP Surface
// Description: axum router wiring the bridge's five operations behind the
// signed transport contract (P7).
// Purpose: Verify `X-Signature` on every entry point before the body is
// ever deserialized into an operation request, then dispatch to `Bridge`.
// Dependencies: axum, hpcjudge-transport, hpcjudge-core
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use hpcjudge_core::ResponseEnvelope;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::BridgeError;
use crate::objectstore::ObjectStore;
use crate::operations::Bridge;
use crate::protocol::CalculatePathRequest;
use crate::protocol::ExecuteCommandRequest;
use crate::protocol::FetchObjectRequest;
use crate::protocol::RemoveFileRequest;
use crate::protocol::UploadFilePresignedRequest;
use crate::protocol::UploadFileRequest;

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// The state every bridge handler is wired against.
#[derive(Clone)]
pub struct BridgeState {
    /// The operation implementation.
    pub bridge: Arc<Bridge>,
    /// Object-store client, used by `upload-file`.
    pub object_store: Arc<ObjectStore>,
    /// Shared HMAC secret verified against `X-Signature` on every request.
    pub secret: Arc<Vec<u8>>,
}

/// Builds the bridge HTTP router over `state`.
#[must_use]
pub fn router(state: BridgeState) -> Router {
    Router::new()
        .route("/fetch-object", post(handle_fetch_object))
        .route("/calculate-path", post(handle_calculate_path))
        .route("/remove-file", post(handle_remove_file))
        .route("/upload-file", post(handle_upload_file))
        .route("/upload-file-presigned", post(handle_upload_file_presigned))
        .route("/execute-command", post(handle_execute_command))
        .with_state(state)
}

// ============================================================================
// SECTION: Signature Verification
// ============================================================================

/// Verifies `X-Signature` against `body` under `secret`, then deserializes
/// `body` as `T`. This is the sole entry point every handler routes
/// through, so an unsigned or tampered body is rejected before any
/// operation-specific logic runs (P7).
///
/// # Errors
/// Returns [`BridgeError::MissingSignature`], [`BridgeError::SignatureMismatch`],
/// or [`BridgeError::MalformedRequest`].
fn verify_and_parse<T: DeserializeOwned>(secret: &[u8], headers: &HeaderMap, body: &[u8]) -> Result<T, BridgeError> {
    let signature = headers
        .get("X-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or(BridgeError::MissingSignature)?;
    let valid = hpcjudge_transport::verify_signature(secret, body, signature)
        .map_err(|err| BridgeError::InvalidSigningKey(err.to_string()))?;
    if !valid {
        return Err(BridgeError::SignatureMismatch);
    }
    serde_json::from_slice(body).map_err(|err| BridgeError::MalformedRequest(err.to_string()))
}

fn error_response(err: &BridgeError) -> Response {
    let status = match err {
        BridgeError::MissingSignature | BridgeError::SignatureMismatch => StatusCode::FORBIDDEN,
        BridgeError::MalformedRequest(_) | BridgeError::PathOverflowsPartition | BridgeError::UnknownPartition(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, axum::Json(ResponseEnvelope::<()>::err(err.to_string()))).into_response()
}

fn ok_response<T: Serialize>(payload: T) -> Response {
    axum::Json(ResponseEnvelope::ok(payload)).into_response()
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

async fn handle_fetch_object(State(state): State<BridgeState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: FetchObjectRequest = match verify_and_parse(&state.secret, &headers, &body) {
        Ok(request) => request,
        Err(err) => return error_response(&err),
    };
    match state.bridge.fetch_object(&request).await {
        Ok(response) => ok_response(response),
        Err(err) => error_response(&err),
    }
}

async fn handle_calculate_path(State(state): State<BridgeState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: CalculatePathRequest = match verify_and_parse(&state.secret, &headers, &body) {
        Ok(request) => request,
        Err(err) => return error_response(&err),
    };
    match state.bridge.calculate_path(&request) {
        Ok(response) => ok_response(response),
        Err(err) => error_response(&err),
    }
}

async fn handle_remove_file(State(state): State<BridgeState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: RemoveFileRequest = match verify_and_parse(&state.secret, &headers, &body) {
        Ok(request) => request,
        Err(err) => return error_response(&err),
    };
    match state.bridge.remove_file(&request).await {
        Ok(response) => ok_response(response),
        Err(err) => error_response(&err),
    }
}

async fn handle_upload_file(State(state): State<BridgeState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: UploadFileRequest = match verify_and_parse(&state.secret, &headers, &body) {
        Ok(request) => request,
        Err(err) => return error_response(&err),
    };
    match state.bridge.upload_file(&request, &state.object_store).await {
        Ok(response) => ok_response(response),
        Err(err) => error_response(&err),
    }
}

async fn handle_upload_file_presigned(State(state): State<BridgeState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: UploadFilePresignedRequest = match verify_and_parse(&state.secret, &headers, &body) {
        Ok(request) => request,
        Err(err) => return error_response(&err),
    };
    match state.bridge.upload_file_presigned(&request).await {
        Ok(response) => ok_response(response),
        Err(err) => error_response(&err),
    }
}

async fn handle_execute_command(State(state): State<BridgeState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: ExecuteCommandRequest = match verify_and_parse(&state.secret, &headers, &body) {
        Ok(request) => request,
        Err(err) => return error_response(&err),
    };
    match state.bridge.execute_command(&request).await {
        Ok(response) => ok_response(response),
        Err(err) => error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests use expect on deterministic fixtures.")]

    use hpcjudge_core::PartitionPath;

    use super::*;
    use crate::protocol::CalculatePathRequest;

    #[test]
    fn rejects_unsigned_request() {
        let request = CalculatePathRequest { path: PartitionPath::new("solution", "a") };
        let body = serde_json::to_vec(&request).expect("serialize");
        let result: Result<CalculatePathRequest, BridgeError> = verify_and_parse(b"shared-secret", &HeaderMap::new(), &body);
        assert!(matches!(result, Err(BridgeError::MissingSignature)));
    }

    #[test]
    fn rejects_tampered_body() {
        let secret = b"shared-secret";
        let body = br#"{"path":{"partition":"solution","relative":"a"}}"#;
        let signature = hpcjudge_transport::sign_message(secret, body).expect("sign");
        let mut headers = HeaderMap::new();
        headers.insert("X-Signature", signature.parse().expect("header value"));
        let tampered = br#"{"path":{"partition":"solution","relative":"b"}}"#;
        let result: Result<CalculatePathRequest, BridgeError> = verify_and_parse(secret, &headers, tampered);
        assert!(matches!(result, Err(BridgeError::SignatureMismatch)));
    }
}
