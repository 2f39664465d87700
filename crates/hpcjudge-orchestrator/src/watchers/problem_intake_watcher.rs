// crates/hpcjudge-orchestrator/src/watchers/problem_intake_watcher.rs
// ============================================================================
// Module: HPC Judge Problem-Data Intake Watcher
// Description: Polls the problem bucket for `ProblemDataFile` (`data.tar`)
// uploads, extracts `problem.toml`, and pushes the archive out to every
// bridge routable to the descriptor's tags (§4.5.D).
// Purpose: Keep problem data and the bridges' local staged copies in sync
// without requiring the uploader to know which bridges exist.
// Dependencies: hpcjudge-core, hpcjudge-bridge, hpcjudge-transport,
// hpcjudge-discovery, tar, toml
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use hpcjudge_bridge::client::BridgeClient;
use hpcjudge_bridge::protocol::ExecuteCommandRequest;
use hpcjudge_bridge::protocol::FetchObjectRequest;
use hpcjudge_bridge::protocol::RemoveFileRequest;
use hpcjudge_core::PartitionPath;
use hpcjudge_core::ProblemDescriptor;
use hpcjudge_core::QueryParameters;
use hpcjudge_core::Service;
use hpcjudge_core::constants::HPC_BRIDGE_DISCOVERY_TYPE;
use hpcjudge_core::constants::PROBLEM_DATA_FILE;
use hpcjudge_core::constants::PROBLEM_DATA_TMP_FILE;
use hpcjudge_core::constants::PROBLEM_DESCRIPTOR_FILE;
use hpcjudge_discovery::Client as DiscoveryClient;
use hpcjudge_transport::SignedClient;

use crate::error::OrchestratorError;
use crate::kvlock::KvLock;
use crate::kvlock::problem_event_key;
use crate::objectstore::ObjectSummary;
use crate::objectstore::ObjectStore;
use crate::problem::extract_descriptor_toml;
use crate::sink::EventKind;
use crate::sink::OperationalEvent;
use crate::sink::OperationalSink;

// ============================================================================
// SECTION: Watcher
// ============================================================================

/// Drains `data.tar` uploads on the problem bucket.
pub struct ProblemIntakeWatcher {
    store: ObjectStore,
    lock: KvLock,
    prefix: String,
    dedupe_ttl: Duration,
    poll_interval: Duration,
    discovery: DiscoveryClient,
    secret_key: Vec<u8>,
    sink: Arc<dyn OperationalSink>,
}

impl ProblemIntakeWatcher {
    /// Builds a problem-intake watcher polling every `poll_interval`,
    /// deduping events under `prefix` for `dedupe_ttl`, and pushing staged
    /// copies to bridges resolved via `discovery`.
    #[must_use]
    pub fn new(
        store: ObjectStore,
        lock: KvLock,
        prefix: String,
        dedupe_ttl: Duration,
        poll_interval: Duration,
        discovery: DiscoveryClient,
        secret_key: Vec<u8>,
        sink: Arc<dyn OperationalSink>,
    ) -> Self {
        Self { store, lock, prefix, dedupe_ttl, poll_interval, discovery, secret_key, sink }
    }

    /// Polls forever at `poll_interval` until the process exits.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.poll_once().await {
                self.sink.record(OperationalEvent::new(EventKind::WatcherPollFailed, err.to_string()));
            }
        }
    }

    async fn poll_once(&self) -> Result<(), OrchestratorError> {
        let objects = self.store.list_with_suffix(self.store.problem_bucket(), PROBLEM_DATA_FILE).await?;
        for object in &objects {
            self.handle_object(object).await;
        }
        Ok(())
    }

    async fn handle_object(&self, object: &ObjectSummary) {
        let Some(problem_id) = problem_id_from_key(&object.key, PROBLEM_DATA_FILE) else {
            return;
        };
        let dedupe_key = problem_event_key(&self.prefix, &problem_id, &object.etag);
        match self.lock.acquire(&dedupe_key, self.dedupe_ttl).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                self.sink.record(OperationalEvent::new(EventKind::KvLockUnavailable, err.to_string()));
                return;
            }
        }
        // Errors are logged and the next event retries (§4.5.D) — release
        // the dedupe key so a subsequent poll sees this object again.
        if let Err(err) = self.process(&problem_id, &object.key).await {
            let _ = self.lock.release(&dedupe_key).await;
            self.sink.record(OperationalEvent::new(EventKind::WatcherPollFailed, format!("{problem_id}: {err}")));
        }
    }

    async fn process(&self, problem_id: &str, archive_key: &str) -> Result<(), OrchestratorError> {
        let archive = self.store.get(self.store.problem_bucket(), archive_key).await?;
        let descriptor_bytes = extract_descriptor_toml(&archive)?;
        let descriptor_key = format!("{problem_id}/{PROBLEM_DESCRIPTOR_FILE}");
        self.store.put(self.store.problem_bucket(), &descriptor_key, descriptor_bytes.clone()).await?;

        let descriptor_text = String::from_utf8(descriptor_bytes).map_err(|err| OrchestratorError::ProblemDescriptor(err.to_string()))?;
        let descriptor: ProblemDescriptor = toml::from_str(&descriptor_text).map_err(|err| OrchestratorError::ProblemDescriptor(err.to_string()))?;

        let query = QueryParameters {
            kind: Some(HPC_BRIDGE_DISCOVERY_TYPE.to_string()),
            tags: descriptor.environment.tags.clone(),
            exclude_tags: descriptor.environment.exclude_tags.clone(),
            ..QueryParameters::default()
        };
        let bridges = self.discovery.list(&query).await?;

        // Pushed to every routable bridge concurrently: each bridge's
        // staged copy is independent, so one bridge being slow or
        // unreachable must not delay the others (open question, decided
        // here — see DESIGN.md).
        let archive_get_url = self.store.presigned_get(self.store.problem_bucket(), archive_key).await?;
        let pushes = bridges.into_iter().map(|bridge| self.push_to_bridge(bridge, problem_id, archive_get_url.clone()));
        let results = futures_util::future::join_all(pushes).await;
        for result in results {
            if let Err(err) = result {
                self.sink.record(OperationalEvent::new(EventKind::WatcherPollFailed, format!("{problem_id}: {err}")));
            }
        }
        Ok(())
    }

    async fn push_to_bridge(&self, bridge: Service, problem_id: &str, archive_get_url: String) -> Result<(), OrchestratorError> {
        let client = BridgeClient::new(SignedClient::new(bridge.address, self.secret_key.clone()));
        let tmp_path = PartitionPath::new("problem", format!("{problem_id}/{PROBLEM_DATA_TMP_FILE}"));
        let problem_dir = PartitionPath::new("problem", problem_id.to_string());

        client
            .fetch_object(&FetchObjectRequest { source_url: archive_get_url, destination: tmp_path.clone(), owner: None, mode: None })
            .await?;
        run_root_command(&client, &problem_dir, "tar", vec!["-xf".to_string(), PROBLEM_DATA_TMP_FILE.to_string()]).await?;
        run_root_command(&client, &problem_dir, "chmod", vec!["-R".to_string(), "0755".to_string(), ".".to_string()]).await?;
        run_root_command(&client, &problem_dir, "chown", vec!["-R".to_string(), "root:root".to_string(), ".".to_string()]).await?;
        client.remove_file(&RemoveFileRequest { path: tmp_path }).await?;
        Ok(())
    }
}

async fn run_root_command(
    client: &BridgeClient<SignedClient>,
    work_directory: &PartitionPath,
    command: &str,
    arguments: Vec<String>,
) -> Result<(), OrchestratorError> {
    client
        .execute_command(&ExecuteCommandRequest {
            command: command.to_string(),
            arguments,
            work_directory: work_directory.clone(),
            user: "root".to_string(),
            env: Vec::new(),
            r#async: false,
            report_url: None,
        })
        .await?;
    Ok(())
}

/// Strips `suffix` from an object key of the form `<problem-id>/<suffix>`.
fn problem_id_from_key(key: &str, suffix: &str) -> Option<String> {
    key.strip_suffix(suffix)?.strip_suffix('/').map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_problem_id_from_well_formed_key() {
        assert_eq!(problem_id_from_key("p1/data.tar", "data.tar"), Some("p1".to_string()));
    }

    #[test]
    fn rejects_key_with_no_problem_id_segment() {
        assert_eq!(problem_id_from_key("data.tar", "data.tar"), None);
    }
}
