// crates/hpcjudge-orchestrator/src/watchers/command_watcher.rs
// ============================================================================
// Module: HPC Judge Command-Report Watcher
// Description: Polls the solution bucket for `RunCommandReportFile`
// (`run-command-report.json`), the bridge's async execute-command delivery,
// and arms the 2.5s watchdog on a clean exit (§4.5.C).
// Purpose: Translate a failed or crashed spawn into an immediate failure
// verdict, and catch the case where the judge script exited 0 without ever
// writing its own `result.json`.
// Dependencies: hpcjudge-core, serde_json, tokio
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use hpcjudge_core::ExecuteCommandReport;
use hpcjudge_core::clock::backdated_micros;
use hpcjudge_core::clock::now_micros;
use hpcjudge_core::constants::RUN_COMMAND_REPORT_FILE;
use hpcjudge_core::constants::WATCHDOG_BACKDATE_MS;
use hpcjudge_core::constants::WATCHDOG_DELAY_MS;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::kvlock::KvLock;
use crate::kvlock::solution_event_key;
use crate::kvlock::submission_lock_key;
use crate::objectstore::ObjectSummary;
use crate::objectstore::ObjectStore;
use crate::sink::EventKind;
use crate::sink::OperationalEvent;
use crate::sink::OperationalSink;
use crate::verdict::VerdictPublisher;
use crate::verdict::failure_report;

// ============================================================================
// SECTION: Watcher
// ============================================================================

/// Drains `run-command-report.json` uploads on the solution bucket.
pub struct CommandWatcher {
    store: ObjectStore,
    lock: KvLock,
    prefix: String,
    dedupe_ttl: Duration,
    poll_interval: Duration,
    verdicts: Arc<VerdictPublisher>,
    sink: Arc<dyn OperationalSink>,
}

impl CommandWatcher {
    /// Builds a command-report watcher polling every `poll_interval`,
    /// deduping events under `prefix` for `dedupe_ttl`.
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
        let objects = self.store.list_with_suffix(self.store.solution_bucket(), RUN_COMMAND_REPORT_FILE).await?;
        for object in &objects {
            self.handle_object(object).await;
        }
        Ok(())
    }

    async fn handle_object(&self, object: &ObjectSummary) {
        let Some(solution_id) = super::solution_id_from_key(&object.key, RUN_COMMAND_REPORT_FILE) else {
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

    async fn process(&self, solution_id: Uuid, key: &str) -> Result<(), OrchestratorError> {
        let bytes = self.store.get(self.store.solution_bucket(), key).await?;
        let report = match serde_json::from_slice::<ExecuteCommandReport>(&bytes) {
            Ok(report) => report,
            Err(err) => {
                let verdict = failure_report(solution_id, format!("malformed run-command-report.json: {err}"), now_micros());
                return self.verdicts.publish(verdict).await;
            }
        };

        if !report.success || report.exit_status != 0 {
            let reason = command_failure_reason(&report);
            let verdict = failure_report(solution_id, reason, now_micros());
            return self.verdicts.publish(verdict).await;
        }

        self.arm_watchdog(solution_id);
        Ok(())
    }

    /// Schedules the 2.5s watchdog for a submission whose spawned process
    /// exited cleanly. If the outer submission lock is still held once the
    /// delay elapses, the judge script never reported its own verdict:
    /// release the lock and publish a back-dated failure so a real,
    /// slightly-late verdict still wins downstream ordering (§9, deliberate
    /// — do not "fix"). [`KvLock::release`] doubles as the atomic
    /// "is it still mine to fire" check, so a real verdict that clears the
    /// lock first prevents this path from firing at all.
    fn arm_watchdog(&self, solution_id: Uuid) {
        let lock = self.lock.clone();
        let prefix = self.prefix.clone();
        let verdicts = Arc::clone(&self.verdicts);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(WATCHDOG_DELAY_MS)).await;
            let lock_key = submission_lock_key(&prefix, &solution_id.to_string());
            match lock.release(&lock_key).await {
                Ok(true) => {
                    sink.record(OperationalEvent::new(EventKind::WatchdogFired, solution_id.to_string()));
                    let timestamp = backdated_micros(WATCHDOG_BACKDATE_MS);
                    let verdict = failure_report(solution_id, "judge-script-exited-before-reporting-done", timestamp);
                    let _ = verdicts.publish(verdict).await;
                }
                Ok(false) => {}
                Err(err) => {
                    sink.record(OperationalEvent::new(EventKind::KvLockUnavailable, err.to_string()));
                }
            }
        });
    }
}

/// Picks the most specific failure reason available on a non-clean report:
/// stderr, then stdout, then the bridge's own error field.
fn command_failure_reason(report: &ExecuteCommandReport) -> String {
    if !report.stderr.is_empty() {
        report.stderr.clone()
    } else if !report.stdout.is_empty() {
        report.stdout.clone()
    } else {
        report.error.clone().unwrap_or_else(|| "command failed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_stderr_over_stdout_and_error() {
        let report =
            ExecuteCommandReport { success: true, exit_status: 2, stdout: "out".into(), stderr: "boom".into(), error: None };
        assert_eq!(command_failure_reason(&report), "boom");
    }

    #[test]
    fn falls_back_to_error_when_streams_are_empty() {
        let report =
            ExecuteCommandReport { success: false, exit_status: -1, stdout: String::new(), stderr: String::new(), error: Some("spawn failed".into()) };
        assert_eq!(command_failure_reason(&report), "spawn failed");
    }
}
