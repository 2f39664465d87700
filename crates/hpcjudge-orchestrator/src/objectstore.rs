// crates/hpcjudge-orchestrator/src/objectstore.rs
// ============================================================================
// Module: HPC Judge Orchestrator Object Store
// Description: S3-compatible client used by `ProcessJudge` (presign GET/PUT)
// and the three event watchers (poll-based listing, get).
// Purpose: Give the orchestrator the same object-store shape as the bridge's
// own client, extended with presigning and listing since this is the side
// that mints URLs and drains events rather than only accepting uploads.
// Dependencies: aws-sdk-s3, aws-config
// ============================================================================

//! ## Overview
//! Grounded on `hpcjudge_bridge::objectstore::ObjectStore`'s construction
//! shape; extended here with `presigned_get`/`presigned_put` (the
//! orchestrator, not the bridge, holds the credentials needed to mint those)
//! and `list_with_suffix`, the poll primitive the three watchers share since
//! the distilled spec explicitly puts the object store's own notification
//! transport out of scope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use hpcjudge_config::ObjectStoreConfig;

use crate::error::OrchestratorError;

// ============================================================================
// SECTION: Object Summary
// ============================================================================

/// One entry returned by [`ObjectStore::list_with_suffix`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Full object key.
    pub key: String,
    /// The object's current ETag, used as the dedupe discriminator (an
    /// overwrite of the same key gets a fresh ETag and is treated as a new
    /// event).
    pub etag: String,
}

// ============================================================================
// SECTION: Object Store Client
// ============================================================================

/// S3-compatible client bound to the problem and solution buckets, plus the
/// presign expiry window configured for this orchestrator.
#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
    problem_bucket: String,
    solution_bucket: String,
    presign_expiry: Duration,
}

impl ObjectStore {
    /// Builds an object store client from `config`.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::ObjectStore`] if the underlying AWS
    /// configuration cannot be assembled.
    pub async fn new(config: &ObjectStoreConfig) -> Result<Self, OrchestratorError> {
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
            presign_expiry: config.presigned_expiry,
        })
    }

    /// Returns the configured problem-data bucket name.
    #[must_use]
    pub fn problem_bucket(&self) -> &str {
        &self.problem_bucket
    }

    /// Returns the configured solution-data bucket name.
    #[must_use]
    pub fn solution_bucket(&self) -> &str {
        &self.solution_bucket
    }

    /// Downloads `bucket`/`key` fully into memory.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::ObjectStore`] on a missing object or
    /// transport failure.
    pub async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, OrchestratorError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| OrchestratorError::ObjectStore(err.to_string()))?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|err| OrchestratorError::ObjectStore(err.to_string()))?;
        Ok(bytes.into_bytes().to_vec())
    }

    /// Uploads `bytes` to `bucket`/`key` under orchestrator-held credentials.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::ObjectStore`] if the backend rejects the
    /// request.
    pub async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), OrchestratorError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| OrchestratorError::ObjectStore(err.to_string()))?;
        Ok(())
    }

    /// Mints a presigned GET URL for `bucket`/`key`, valid for this store's
    /// configured expiry window.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::ObjectStore`] if presigning fails.
    pub async fn presigned_get(&self, bucket: &str, key: &str) -> Result<String, OrchestratorError> {
        let config = PresigningConfig::expires_in(self.presign_expiry).map_err(|err| OrchestratorError::ObjectStore(err.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|err| OrchestratorError::ObjectStore(err.to_string()))?;
        Ok(request.uri().to_string())
    }

    /// Mints a presigned PUT URL for `bucket`/`key`, valid for this store's
    /// configured expiry window.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::ObjectStore`] if presigning fails.
    pub async fn presigned_put(&self, bucket: &str, key: &str) -> Result<String, OrchestratorError> {
        let config = PresigningConfig::expires_in(self.presign_expiry).map_err(|err| OrchestratorError::ObjectStore(err.to_string()))?;
        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|err| OrchestratorError::ObjectStore(err.to_string()))?;
        Ok(request.uri().to_string())
    }

    /// Lists every object in `bucket` whose key ends with `suffix`, the poll
    /// primitive the three watchers drive on a timer in place of a live
    /// bucket-notification subscription.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::ObjectStore`] on a transport failure.
    pub async fn list_with_suffix(&self, bucket: &str, suffix: &str) -> Result<Vec<ObjectSummary>, OrchestratorError> {
        let mut summaries = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }
            let response = request.send().await.map_err(|err| OrchestratorError::ObjectStore(err.to_string()))?;
            for object in response.contents.into_iter().flatten() {
                let (Some(key), Some(etag)) = (object.key, object.e_tag) else {
                    continue;
                };
                if key.ends_with(suffix) {
                    summaries.push(ObjectSummary { key, etag });
                }
            }
            if response.is_truncated == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }
        Ok(summaries)
    }
}
