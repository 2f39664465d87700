// crates/hpcjudge-bridge/src/operations.rs
// ============================================================================
// Module: HPC Judge Bridge Operations
// Description: Implements the bridge's five operations against a
// `PartitionTable`: fetch-object, calculate-path, remove-file, upload-file,
// execute-command.
// Purpose: Keep every partition-qualified filesystem touch routed through
// `PartitionTable::open_parent` (P3) and every user-context command spawn
// routed through `usercontext::resolve_user`.
// Dependencies: hpcjudge-core, tokio, reqwest, libc
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsStr;
use std::os::unix::process::CommandExt as _;
use std::process::Stdio;

use cap_std::fs::Dir;
use hpcjudge_core::PartitionPath;
use hpcjudge_core::PartitionTable;
use tokio::io::AsyncReadExt as _;
use tokio::process::Command;

use crate::error::BridgeError;
use crate::objectstore::ObjectStore;
use crate::objectstore::put_presigned;
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
use crate::usercontext;

// ============================================================================
// SECTION: Bridge
// ============================================================================

/// Implements the bridge's five operations against a configured partition
/// table.
pub struct Bridge {
    /// Partition name to filesystem root mapping.
    partitions: PartitionTable,
    /// HTTP client used to fetch source URLs.
    http: reqwest::Client,
}

impl Bridge {
    /// Builds a bridge bound to `partitions`.
    #[must_use]
    pub fn new(partitions: PartitionTable) -> Self {
        Self { partitions, http: reqwest::Client::new() }
    }

    /// Returns the partition table this bridge resolves paths against.
    #[must_use]
    pub fn partitions(&self) -> &PartitionTable {
        &self.partitions
    }

    // ------------------------------------------------------------------
    // fetch-object
    // ------------------------------------------------------------------

    /// Downloads `request.source_url` into the partition-qualified
    /// destination, optionally chowning/chmodding the result.
    ///
    /// # Errors
    /// Returns [`BridgeError::FetchFailed`] if the download fails, or the
    /// usual partition-resolution errors (P3).
    pub async fn fetch_object(&self, request: &FetchObjectRequest) -> Result<FetchObjectResponse, BridgeError> {
        // Validate the destination before spending a network round trip on
        // a request that could never be written anywhere (P3).
        self.partitions.resolve_absolute(&request.destination)?;

        let response = self
            .http
            .get(&request.source_url)
            .send()
            .await
            .map_err(|err| BridgeError::FetchFailed(err.to_string()))?;
        if !response.status().is_success() {
            return Err(BridgeError::FetchFailed(format!("source returned {}", response.status())));
        }
        let bytes = response.bytes().await.map_err(|err| BridgeError::FetchFailed(err.to_string()))?;

        let partitions = self.partitions.clone();
        let destination = request.destination.clone();
        let owner = request.owner.clone();
        let mode = request.mode;
        let body = bytes.to_vec();
        tokio::task::spawn_blocking(move || write_fetched_object(&partitions, &destination, body, owner.as_deref(), mode))
            .await
            .map_err(|err| BridgeError::Io(err.to_string()))??;
        Ok(FetchObjectResponse {})
    }

    // ------------------------------------------------------------------
    // calculate-path
    // ------------------------------------------------------------------

    /// Resolves a partition-qualified path to its absolute local path.
    ///
    /// # Errors
    /// Returns the usual partition-resolution errors (P3).
    pub fn calculate_path(&self, request: &CalculatePathRequest) -> Result<CalculatePathResponse, BridgeError> {
        let absolute = self.partitions.resolve_absolute(&request.path)?;
        Ok(CalculatePathResponse { absolute_path: absolute.display().to_string() })
    }

    // ------------------------------------------------------------------
    // remove-file
    // ------------------------------------------------------------------

    /// Removes a partition-qualified file or directory, recursively.
    ///
    /// # Errors
    /// Returns the usual partition-resolution errors (P3), or
    /// [`BridgeError::Io`] if removal fails.
    pub async fn remove_file(&self, request: &RemoveFileRequest) -> Result<RemoveFileResponse, BridgeError> {
        let partitions = self.partitions.clone();
        let path = request.path.clone();
        tokio::task::spawn_blocking(move || remove_partition_path(&partitions, &path))
            .await
            .map_err(|err| BridgeError::Io(err.to_string()))??;
        Ok(RemoveFileResponse {})
    }

    // ------------------------------------------------------------------
    // upload-file
    // ------------------------------------------------------------------

    /// Uploads a partition-qualified file to `request.bucket`/`object_key`
    /// using bridge-held object-store credentials.
    ///
    /// # Errors
    /// Returns the usual partition-resolution errors (P3), or
    /// [`BridgeError::UploadFailed`].
    pub async fn upload_file(&self, request: &UploadFileRequest, store: &ObjectStore) -> Result<UploadFileResponse, BridgeError> {
        let bytes = self.read_partition_file(&request.source).await?;
        store.put(request.bucket, &request.object_key, bytes).await?;
        Ok(UploadFileResponse {})
    }

    /// Uploads a partition-qualified file to a caller-supplied presigned
    /// PUT URL.
    ///
    /// # Errors
    /// Returns the usual partition-resolution errors (P3), or
    /// [`BridgeError::UploadFailed`].
    pub async fn upload_file_presigned(&self, request: &UploadFilePresignedRequest) -> Result<UploadFileResponse, BridgeError> {
        let bytes = self.read_partition_file(&request.source).await?;
        put_presigned(&request.presigned_url, bytes).await?;
        Ok(UploadFileResponse {})
    }

    async fn read_partition_file(&self, path: &PartitionPath) -> Result<Vec<u8>, BridgeError> {
        let partitions = self.partitions.clone();
        let path = path.clone();
        tokio::task::spawn_blocking(move || read_partition_path(&partitions, &path))
            .await
            .map_err(|err| BridgeError::Io(err.to_string()))?
    }

    // ------------------------------------------------------------------
    // execute-command
    // ------------------------------------------------------------------

    /// Dispatches `request` either synchronously or asynchronously
    /// depending on `request.async`.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnknownUser`], the usual partition-resolution
    /// errors (P3), [`BridgeError::SpawnFailed`], or, for an async request
    /// with no `report_url`, a validation failure reported as
    /// [`BridgeError::SpawnFailed`].
    pub async fn execute_command(&self, request: &ExecuteCommandRequest) -> Result<ExecuteCommandResponse, BridgeError> {
        if request.r#async {
            self.execute_command_async(request)
        } else {
            self.execute_command_sync(request).await
        }
    }

    /// Runs `request` as its designated unix user, synchronously, returning
    /// the captured output.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnknownUser`], the usual partition-resolution
    /// errors (P3), or [`BridgeError::SpawnFailed`].
    pub async fn execute_command_sync(&self, request: &ExecuteCommandRequest) -> Result<ExecuteCommandResponse, BridgeError> {
        let work_directory = self.partitions.resolve_absolute(&request.work_directory)?;
        let mut command = self.build_command(request, &work_directory)?;
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|err| BridgeError::SpawnFailed(err.to_string()))?;
        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut handle) = child.stdout.take() {
            let _ = handle.read_to_string(&mut stdout).await;
        }
        if let Some(mut handle) = child.stderr.take() {
            let _ = handle.read_to_string(&mut stderr).await;
        }
        let status = child.wait().await.map_err(|err| BridgeError::SpawnFailed(err.to_string()))?;
        Ok(ExecuteCommandResponse { exit_status: status.code(), stdout, stderr })
    }

    /// Spawns `request` as its designated unix user and returns
    /// immediately with an empty ack. When the process exits, PUTs a
    /// serialised [`hpcjudge_core::ExecuteCommandReport`] to
    /// `request.report_url`. A failure to spawn at all is itself reported
    /// (`success: false`) rather than surfaced as a bridge-level error,
    /// matching the contract that a non-zero/failed command is not a
    /// bridge failure.
    ///
    /// # Errors
    /// Returns [`BridgeError::SpawnFailed`] if `report_url` is missing, or
    /// the usual partition-resolution errors (P3).
    pub fn execute_command_async(&self, request: &ExecuteCommandRequest) -> Result<ExecuteCommandResponse, BridgeError> {
        let report_url = request
            .report_url
            .clone()
            .ok_or_else(|| BridgeError::SpawnFailed("async execute-command requires report_url".to_string()))?;
        let work_directory = self.partitions.resolve_absolute(&request.work_directory)?;
        let mut command = match self.build_command(request, &work_directory) {
            Ok(command) => command,
            Err(err) => {
                let http = self.http.clone();
                tokio::spawn(async move {
                    deliver_report(&http, &report_url, failed_report(err.to_string())).await;
                });
                return Ok(ExecuteCommandResponse { exit_status: None, stdout: String::new(), stderr: String::new() });
            }
        };
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let http = self.http.clone();
        tokio::spawn(async move {
            let report = match command.spawn() {
                Ok(mut child) => {
                    let mut stdout = String::new();
                    let mut stderr = String::new();
                    if let Some(mut handle) = child.stdout.take() {
                        let _ = handle.read_to_string(&mut stdout).await;
                    }
                    if let Some(mut handle) = child.stderr.take() {
                        let _ = handle.read_to_string(&mut stderr).await;
                    }
                    match child.wait().await {
                        Ok(status) => hpcjudge_core::ExecuteCommandReport {
                            success: true,
                            exit_status: status.code().unwrap_or(-1),
                            stdout,
                            stderr,
                            error: None,
                        },
                        Err(err) => failed_report(err.to_string()),
                    }
                }
                Err(err) => failed_report(err.to_string()),
            };
            deliver_report(&http, &report_url, report).await;
        });
        Ok(ExecuteCommandResponse { exit_status: None, stdout: String::new(), stderr: String::new() })
    }

    /// Builds the `tokio::process::Command` shared by the sync and async
    /// execute-command paths, up to (but not including) stdio wiring.
    fn build_command(&self, request: &ExecuteCommandRequest, work_directory: &std::path::Path) -> Result<Command, BridgeError> {
        let user = usercontext::resolve_user(&request.user)?;
        usercontext::ensure_home_dir(&user.home, user.uid, user.gid)?;

        let mut env = usercontext::base_environment(&request.user, &user.home);
        env.extend(request.env.iter().cloned());

        let mut command = Command::new(&request.command);
        command
            .args(&request.arguments)
            .current_dir(work_directory)
            .env_clear()
            .envs(env)
            .uid(user.uid)
            .gid(user.gid)
            .stdin(Stdio::null());
        Ok(command)
    }
}

/// Builds a failure report for a command that could not even be spawned.
fn failed_report(error: String) -> hpcjudge_core::ExecuteCommandReport {
    hpcjudge_core::ExecuteCommandReport { success: false, exit_status: -1, stdout: String::new(), stderr: String::new(), error: Some(error) }
}

/// Delivers an async command's report to its callback URL. Delivery
/// failure has nowhere to surface (the caller already returned its ack);
/// it is the orchestrator's watchdog, not this call, that guards against
/// a report that never arrives.
async fn deliver_report(http: &reqwest::Client, report_url: &str, report: hpcjudge_core::ExecuteCommandReport) {
    let _ = http.put(report_url).json(&report).send().await;
}

// ============================================================================
// SECTION: Blocking Filesystem Helpers
// ============================================================================

/// Writes `body` into the partition-qualified destination, creating parent
/// directories as needed, then applies `owner`/`mode` if given. Runs on a
/// blocking thread: the underlying `cap_std::fs::Dir` walk is synchronous.
fn write_fetched_object(
    partitions: &PartitionTable,
    destination: &PartitionPath,
    body: Vec<u8>,
    owner: Option<&str>,
    mode: Option<u32>,
) -> Result<(), BridgeError> {
    let (parent, leaf) = partitions.open_parent(destination, true)?;
    parent.write(&leaf, &body).map_err(|err| BridgeError::Io(err.to_string()))?;
    if mode.is_some() || owner.is_some() {
        let file = parent.open(&leaf).map_err(|err| BridgeError::Io(err.to_string()))?;
        if let Some(mode) = mode {
            usercontext::fchmod_fd(&file, mode)?;
        }
        if let Some(owner) = owner {
            let user = usercontext::resolve_user(owner)?;
            usercontext::fchown_fd(&file, user.uid, user.gid)?;
        }
    }
    Ok(())
}

/// Reads the partition-qualified file at `path` into memory.
fn read_partition_path(partitions: &PartitionTable, path: &PartitionPath) -> Result<Vec<u8>, BridgeError> {
    let (parent, leaf) = partitions.open_parent(path, false)?;
    parent.read(&leaf).map_err(|err| BridgeError::Io(err.to_string()))
}

/// Removes the partition-qualified entry at `path`, recursing into
/// directories without ever following a symlink out of the partition.
fn remove_partition_path(partitions: &PartitionTable, path: &PartitionPath) -> Result<(), BridgeError> {
    let (parent, leaf) = partitions.open_parent(path, false)?;
    remove_entry(&parent, &leaf)
}

/// Removes a single named entry under `parent`. Directories are removed
/// recursively via `cap_std`'s own sandboxed `remove_dir_all`, which never
/// follows a symlink out of `parent` while walking.
fn remove_entry(parent: &Dir, name: &OsStr) -> Result<(), BridgeError> {
    let metadata = parent.symlink_metadata(name).map_err(|err| BridgeError::Io(err.to_string()))?;
    if metadata.is_dir() {
        parent.remove_dir_all(name).map_err(|err| BridgeError::Io(err.to_string()))?;
    } else {
        parent.remove_file(name).map_err(|err| BridgeError::Io(err.to_string()))?;
    }
    Ok(())
}
