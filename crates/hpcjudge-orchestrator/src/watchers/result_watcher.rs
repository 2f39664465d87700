// crates/hpcjudge-orchestrator/src/watchers/result_watcher.rs
// ============================================================================
// Module: HPC Judge Result Watcher
// Description: Polls the solution bucket for `JudgeReportFile` (`result.json`)
// uploads, the judge script's own verdict (§4.5.B).
// Purpose: Dedupe by (solution-id, ETag), publish the parsed `JudgeResult`
// as a `ReportMessage`, and publish an error verdict instead of silently
// dropping a malformed payload.
// Dependencies: hpcjudge-core, serde_json, tokio
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use hpcjudge_core::JudgeResult;
use hpcjudge_core::clock::now_micros;
use hpcjudge_core::constants::JUDGE_REPORT_FILE;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::kvlock::KvLock;
use crate::kvlock::solution_event_key;
use crate::objectstore::ObjectSummary;
use crate::objectstore::ObjectStore;
use crate::sink::EventKind;
use crate::sink::OperationalEvent;
use crate::sink::OperationalSink;
use crate::verdict::VerdictPublisher;
use crate::verdict::failure_report;
use crate::verdict::report_from_result;

// ============================================================================
// SECTION: Watcher
// ============================================================================

/// Drains `result.json` uploads on the solution bucket.
pub struct ResultWatcher {
    store: ObjectStore,
    lock: KvLock,
    prefix: String,
    dedupe_ttl: Duration,
    poll_interval: Duration,
    verdicts: Arc<VerdictPublisher>,
    sink: Arc<dyn OperationalSink>,
}

impl ResultWatcher {
    /// Builds a result watcher polling every `poll_interval`, deduping
    /// events under `prefix` for `dedupe_ttl`.
    #[must_use]
    pub fn new(
        store: ObjectStore,
        lock: KvLock,
        prefix: String,
        dedupe_ttl: Duration,
        poll_interval: Duration,
        verdicts: Arc<VerdictPublisher>,
        sink: Arc<dyn OperationalSink>,
    ) -> Self {
        Self { store, lock, prefix, dedupe_ttl, poll_interval, verdicts, sink }
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
        let objects = self.store.list_with_suffix(self.store.solution_bucket(), JUDGE_REPORT_FILE).await?;
        for object in &objects {
            self.handle_object(object).await;
        }
        Ok(())
    }

    async fn handle_object(&self, object: &ObjectSummary) {
        let Some(solution_id) = super::solution_id_from_key(&object.key, JUDGE_REPORT_FILE) else {
            return;
        };
        let dedupe_key = solution_event_key(&self.prefix, &solution_id.to_string(), &object.etag);
        match self.lock.acquire(&dedupe_key, self.dedupe_ttl).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                self.sink.record(OperationalEvent::new(EventKind::KvLockUnavailable, err.to_string()));
                return;
            }
        }
        if let Err(err) = self.process(solution_id, &object.key).await {
            let _ = self.lock.release(&dedupe_key).await;
            self.sink.record(OperationalEvent::new(EventKind::WatcherPollFailed, format!("{solution_id}: {err}")));
        }
    }

    /// Downloads and parses `key`, publishing either the forwarded verdict
    /// or, on a malformed payload, an error verdict in its place. Only a
    /// download failure is returned as `Err` — a parse failure is itself a
    /// handled outcome (a published verdict), not a reason to retry.
    async fn process(&self, solution_id: Uuid, key: &str) -> Result<(), OrchestratorError> {
        let bytes = self.store.get(self.store.solution_bucket(), key).await?;
        let report = match serde_json::from_slice::<JudgeResult>(&bytes) {
            Ok(result) => report_from_result(solution_id, &result, now_micros()),
            Err(err) => failure_report(solution_id, format!("malformed result.json: {err}"), now_micros()),
        };
        self.verdicts.publish(report).await
    }
}
