// crates/hpcjudge-bridge/src/client.rs
// ============================================================================
// Module: HPC Judge Bridge Client
// Description: Typed convenience wrapper over `hpcjudge_transport`'s signed
// client, giving callers (the orchestrator, the utility CLI) one method
// per bridge operation instead of hand-assembling paths and bodies.
// Purpose: Keep the five operation shapes and their paths in one place
// rather than scattered across call sites.
// Dependencies: hpcjudge-transport, hpcjudge-core
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use hpcjudge_transport::TransportError;

use crate::protocol::CalculatePathRequest;
use crate::protocol::CalculatePathResponse;
use crate::protocol::ExecuteCommandRequest;
use crate::protocol::ExecuteCommandResponse;
use crate::protocol::FetchObjectRequest;
use crate::protocol::FetchObjectResponse;
use crate::protocol::RemoveFileRequest;
use crate::protocol::RemoveFileResponse;
use crate::protocol::UploadFilePresignedRequest;
use crate::protocol::UploadFileRequest;
use crate::protocol::UploadFileResponse;

/// Anything that can POST a signed, JSON-serialised body to a bridge path
/// and deserialize the response. Implemented by every client shape in
/// `hpcjudge_transport` (single-address, multi-address, discovery-backed),
/// so callers pick their addressing strategy independently of this trait.
#[async_trait::async_trait]
pub trait BridgeTransport: Send + Sync {
    /// POSTs `body` to `path`, signed, returning the decoded response.
    async fn call<B, R>(&self, path: &str, body: &B) -> Result<R, TransportError>
    where
        B: serde::Serialize + Send + Sync,
        R: serde::de::DeserializeOwned;
}

#[async_trait::async_trait]
impl BridgeTransport for hpcjudge_transport::SignedClient {
    async fn call<B, R>(&self, path: &str, body: &B) -> Result<R, TransportError>
    where
        B: serde::Serialize + Send + Sync,
        R: serde::de::DeserializeOwned,
    {
        self.post_signed(path, body).await
    }
}

#[async_trait::async_trait]
impl BridgeTransport for hpcjudge_transport::MultiAddressClient {
    async fn call<B, R>(&self, path: &str, body: &B) -> Result<R, TransportError>
    where
        B: serde::Serialize + Send + Sync,
        R: serde::de::DeserializeOwned,
    {
        self.post_signed(path, body).await
    }
}

#[async_trait::async_trait]
impl BridgeTransport for hpcjudge_transport::DiscoveryBackedClient {
    async fn call<B, R>(&self, path: &str, body: &B) -> Result<R, TransportError>
    where
        B: serde::Serialize + Send + Sync,
        R: serde::de::DeserializeOwned,
    {
        self.post_signed(path, body).await
    }
}

/// A typed bridge client over any [`BridgeTransport`].
pub struct BridgeClient<T: BridgeTransport> {
    transport: T,
}

impl<T: BridgeTransport> BridgeClient<T> {
    /// Wraps `transport` as a typed bridge client.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Calls `fetch-object`.
    ///
    /// # Errors
    /// Returns [`TransportError`] on transport, decode, or signature
    /// failure.
    pub async fn fetch_object(&self, request: &FetchObjectRequest) -> Result<FetchObjectResponse, TransportError> {
        self.transport.call("/fetch-object", request).await
    }

    /// Calls `calculate-path`.
    ///
    /// # Errors
    /// Returns [`TransportError`] on transport, decode, or signature
    /// failure.
    pub async fn calculate_path(&self, request: &CalculatePathRequest) -> Result<CalculatePathResponse, TransportError> {
        self.transport.call("/calculate-path", request).await
    }

    /// Calls `remove-file`.
    ///
    /// # Errors
    /// Returns [`TransportError`] on transport, decode, or signature
    /// failure.
    pub async fn remove_file(&self, request: &RemoveFileRequest) -> Result<RemoveFileResponse, TransportError> {
        self.transport.call("/remove-file", request).await
    }

    /// Calls `upload-file`.
    ///
    /// # Errors
    /// Returns [`TransportError`] on transport, decode, or signature
    /// failure.
    pub async fn upload_file(&self, request: &UploadFileRequest) -> Result<UploadFileResponse, TransportError> {
        self.transport.call("/upload-file", request).await
    }

    /// Calls `upload-file-presigned`.
    ///
    /// # Errors
    /// Returns [`TransportError`] on transport, decode, or signature
    /// failure.
    pub async fn upload_file_presigned(&self, request: &UploadFilePresignedRequest) -> Result<UploadFileResponse, TransportError> {
        self.transport.call("/upload-file-presigned", request).await
    }

    /// Calls `execute-command`, synchronously or asynchronously depending
    /// on `request.async`.
    ///
    /// # Errors
    /// Returns [`TransportError`] on transport, decode, or signature
    /// failure.
    pub async fn execute_command(&self, request: &ExecuteCommandRequest) -> Result<ExecuteCommandResponse, TransportError> {
        self.transport.call("/execute-command", request).await
    }
}
