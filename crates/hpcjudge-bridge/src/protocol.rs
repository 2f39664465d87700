// crates/hpcjudge-bridge/src/protocol.rs
// ============================================================================
// Module: HPC Judge Bridge Wire Protocol
// Description: Request/response shapes for the bridge's five operations.
// Purpose: One canonical set of types shared by the server handlers and
// the client callers.
// Dependencies: serde, hpcjudge-core
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use hpcjudge_core::PartitionPath;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: fetch-object
// ============================================================================

/// Downloads a URL into a partition-qualified destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchObjectRequest {
    /// Source URL (typically presigned).
    pub source_url: String,
    /// Partition-qualified destination path.
    pub destination: PartitionPath,
    /// Owning user to chown the destination to, if any.
    #[serde(default)]
    pub owner: Option<String>,
    /// Unix mode to chmod the destination to, if any.
    #[serde(default)]
    pub mode: Option<u32>,
}

/// Response to [`FetchObjectRequest`]: empty on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchObjectResponse {}

// ============================================================================
// SECTION: calculate-path
// ============================================================================

/// Resolves a partition-qualified path to an absolute local path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatePathRequest {
    /// The path to resolve.
    pub path: PartitionPath,
}

/// Response to [`CalculatePathRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatePathResponse {
    /// The resolved absolute path.
    pub absolute_path: String,
}

// ============================================================================
// SECTION: remove-file
// ============================================================================

/// Removes a partition-qualified file or directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveFileRequest {
    /// The path to remove. Directories are removed recursively.
    pub path: PartitionPath,
}

/// Response to [`RemoveFileRequest`]: empty on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveFileResponse {}

// ============================================================================
// SECTION: upload-file
// ============================================================================

/// Which object-store bucket an upload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketType {
    /// The problem-data bucket.
    Problem,
    /// The solution-data bucket.
    Solution,
}

/// Copies a local partition-qualified file to the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileRequest {
    /// Local source path.
    pub source: PartitionPath,
    /// Target bucket.
    pub bucket: BucketType,
    /// Target object key.
    pub object_key: String,
}

/// A presigned-URL variant of [`UploadFileRequest`], used when the caller
/// has already minted a PUT URL rather than asking the bridge to know
/// about bucket credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFilePresignedRequest {
    /// Local source path.
    pub source: PartitionPath,
    /// Presigned PUT URL.
    pub presigned_url: String,
}

/// Response to an upload request: empty on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileResponse {}

// ============================================================================
// SECTION: execute-command
// ============================================================================

/// Runs a command as a specified unix user in a partition-qualified
/// working directory, synchronously or asynchronously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteCommandRequest {
    /// Program to run.
    pub command: String,
    /// Arguments.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Partition-qualified working directory.
    pub work_directory: PartitionPath,
    /// Unix user to run as.
    pub user: String,
    /// Extra environment variables, appended after the inherited/derived
    /// environment.
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// Whether to return immediately and deliver the report to `report_url`.
    #[serde(default)]
    pub r#async: bool,
    /// Callback URL for the async report, required when `async` is true.
    #[serde(default)]
    pub report_url: Option<String>,
}

/// Synchronous response, or the immediate ack for an asynchronous request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteCommandResponse {
    /// Process exit status. Meaningless (and omitted) for an async ack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
    /// Captured standard output. Empty for an async ack.
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error. Empty for an async ack.
    #[serde(default)]
    pub stderr: String,
}
