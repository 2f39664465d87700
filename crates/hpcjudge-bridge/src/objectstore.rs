// crates/hpcjudge-bridge/src/objectstore.rs
// ============================================================================
// Module: HPC Judge Bridge Object Store
// Description: S3-compatible client used by the `upload-file` operation.
// Purpose: Push a local partition-qualified file to the problem or solution
// bucket, either under bridge-held credentials or via a caller-supplied
// presigned PUT URL.
// Dependencies: aws-sdk-s3, aws-config, reqwest, tokio
// ============================================================================

//! ## Overview
//! Grounded on the reference `S3ObjectStoreClient` put/get shape, adapted to
//! this crate's fully async call sites (the bridge's handlers already run on
//! a tokio runtime, so there is no need for the teacher's blocking-runtime
//! bridge).

// ============================================================================
// SECTION: Imports
// ============================================================================

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use hpcjudge_config::ObjectStoreConfig;

use crate::error::BridgeError;
use crate::protocol::BucketType;

// ============================================================================
// SECTION: Object Store Client
// ============================================================================

/// Thin S3 client wrapper bound to the two buckets this bridge is configured
/// with.
pub struct ObjectStore {
    /// Underlying S3 client.
    client: Client,
    /// Problem-data bucket name.
    problem_bucket: String,
    /// Solution-data bucket name.
    solution_bucket: String,
}

impl ObjectStore {
    /// Builds an object store client from `config`.
    ///
    /// # Errors
    /// Returns [`BridgeError::Io`] if the underlying AWS configuration
    /// cannot be assembled.
    pub async fn new(config: &ObjectStoreConfig) -> Result<Self, BridgeError> {
        let loader = aws_config::defaults(BehaviorVersion::latest()).endpoint_url(config.endpoint.clone());
        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if !config.ssl {
            builder = builder.force_path_style(true);
        }
        let client = Client::from_conf(builder.build());
        Ok(Self {
            client,
            problem_bucket: config.buckets.problem.clone(),
            solution_bucket: config.buckets.solution.clone(),
        })
    }

    /// Returns the configured bucket name for `bucket`.
    #[must_use]
    pub fn bucket_name(&self, bucket: BucketType) -> &str {
        match bucket {
            BucketType::Problem => &self.problem_bucket,
            BucketType::Solution => &self.solution_bucket,
        }
    }

    /// Uploads `bytes` to `bucket`/`object_key` under bridge-held
    /// credentials.
    ///
    /// # Errors
    /// Returns [`BridgeError::UploadFailed`] if the backend rejects the
    /// request.
    pub async fn put(&self, bucket: BucketType, object_key: &str, bytes: Vec<u8>) -> Result<(), BridgeError> {
        let body = ByteStream::from(bytes);
        self.client
            .put_object()
            .bucket(self.bucket_name(bucket))
            .key(object_key)
            .body(body)
            .send()
            .await
            .map_err(|err| BridgeError::UploadFailed(err.to_string()))?;
        Ok(())
    }
}

/// Uploads `bytes` to a caller-supplied presigned PUT URL, used when the
/// orchestrator (not the bridge) holds the bucket credentials.
///
/// # Errors
/// Returns [`BridgeError::UploadFailed`] if the PUT fails or the backend
/// returns a non-success status.
pub async fn put_presigned(presigned_url: &str, bytes: Vec<u8>) -> Result<(), BridgeError> {
    let response = reqwest::Client::new()
        .put(presigned_url)
        .body(bytes)
        .send()
        .await
        .map_err(|err| BridgeError::UploadFailed(err.to_string()))?;
    if !response.status().is_success() {
        return Err(BridgeError::UploadFailed(format!("presigned put returned {}", response.status())));
    }
    Ok(())
}
