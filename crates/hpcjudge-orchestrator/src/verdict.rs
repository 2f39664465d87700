// crates/hpcjudge-orchestrator/src/verdict.rs
// ============================================================================
// Module: HPC Judge Verdict Publication
// Description: Builds and publishes `ReportMessage`s, and ties `done`
// verdicts to releasing the outer submission lock (§4.5 "Verdict
// publication contract").
// Purpose: Give the consumer and all three watchers one call that both
// reports the verdict and clears the lock, so none of them can publish a
// terminal verdict while forgetting to unlock the submission for a re-judge.
// Dependencies: hpcjudge-core, serde_json
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use hpcjudge_core::JudgeResult;
use hpcjudge_core::ReportMessage;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::kvlock::KvLock;
use crate::queue::JudgeQueueProducer;
use crate::sink::EventKind;
use crate::sink::OperationalEvent;
use crate::sink::OperationalSink;

// ============================================================================
// SECTION: Report Construction
// ============================================================================

/// Builds the terminal failure verdict every non-successful path publishes,
/// matching §7's "Internal Error: " + err convention.
#[must_use]
pub fn failure_report(solution_id: Uuid, reason: impl std::fmt::Display, timestamp: i64) -> ReportMessage {
    ReportMessage {
        submission_id: solution_id,
        success: false,
        error: Some(reason.to_string()),
        done: true,
        score: 0,
        message: format!("Internal Error: {reason}"),
        timestamp,
    }
}

/// Builds a verdict from a judge script's own `JudgeResult`, forwarding its
/// `done`/`score`/`message` as-is. `success` mirrors `done` for a clean
/// non-done progress update, and is `true` for a terminal verdict (the
/// judge script is assumed to report failures as `done:true` verdicts of
/// its own wording, not by setting `success` itself — that field exists
/// only on the wire `ReportMessage`, not in `JudgeResult`).
#[must_use]
pub fn report_from_result(solution_id: Uuid, result: &JudgeResult, timestamp: i64) -> ReportMessage {
    ReportMessage {
        submission_id: solution_id,
        success: true,
        error: None,
        done: result.done,
        score: result.score,
        message: result.message.clone(),
        timestamp,
    }
}

// ============================================================================
// SECTION: Publisher
// ============================================================================

/// Publishes verdicts and clears the outer submission lock on every
/// terminal (`done: true`) publish.
pub struct VerdictPublisher {
    producer: JudgeQueueProducer,
    lock: KvLock,
    prefix: String,
    sink: Arc<dyn OperationalSink>,
}

impl VerdictPublisher {
    /// Builds a publisher over `producer`, releasing locks through `lock`
    /// under `prefix`.
    #[must_use]
    pub fn new(producer: JudgeQueueProducer, lock: KvLock, prefix: String, sink: Arc<dyn OperationalSink>) -> Self {
        Self { producer, lock, prefix, sink }
    }

    /// Serialises and publishes `report`. If `report.done`, releases the
    /// outer submission lock for `report.submission_id` regardless of
    /// whether this call is the one that originally acquired it — a given
    /// submission has exactly one live lock key, and clearing it is what
    /// makes the verdict terminal in the at-most-once sense (P5).
    ///
    /// # Errors
    /// Returns [`OrchestratorError::MalformedPayload`] if `report` somehow
    /// fails to serialise, or a transport/lock error from the underlying
    /// producer/lock calls.
    pub async fn publish(&self, report: ReportMessage) -> Result<(), OrchestratorError> {
        let solution_id = report.submission_id;
        let done = report.done;
        let body = serde_json::to_vec(&report)?;
        self.producer.publish(body).await?;
        if done {
            let key = crate::kvlock::submission_lock_key(&self.prefix, &solution_id.to_string());
            self.lock.release(&key).await?;
        }
        self.sink.record(OperationalEvent::new(EventKind::VerdictPublished, solution_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_report_prefixes_message_with_internal_error() {
        let report = failure_report(Uuid::nil(), "boom", 0);
        assert_eq!(report.message, "Internal Error: boom");
        assert!(report.done);
        assert!(!report.success);
    }

    #[test]
    fn report_from_result_forwards_score_and_done() {
        let result = JudgeResult { done: true, score: 87, message: "OK".to_string(), detailed_message: None, subtasks: Vec::new() };
        let report = report_from_result(Uuid::nil(), &result, 0);
        assert_eq!(report.score, 87);
        assert!(report.done);
        assert!(report.success);
    }
}
