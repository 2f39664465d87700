// crates/hpcjudge-orchestrator/src/consumer.rs
// ============================================================================
// Module: HPC Judge Queue Consumer
// Description: Drains the inbound judge topic: touches, parses, attempt-
// checks, dispatches via `process_judge`, and requeues/finishes/publishes a
// failure verdict according to the outcome (§4.5.A).
// Purpose: The one place that owns the "touch before long operations, touch
// again at the configured interval" suspension-point discipline (§5), so no
// handler can silently let a message fall out of visibility mid-dispatch.
// Dependencies: tokio, hpcjudge-core, serde_json
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use hpcjudge_core::JudgeMessage;
use hpcjudge_core::clock::now_micros;
use tokio::sync::Semaphore;

use crate::kvlock::submission_lock_key;
use crate::process_judge::ProcessJudgeContext;
use crate::process_judge::ProcessOutcome;
use crate::process_judge::process_judge;
use crate::queue::InboundMessage;
use crate::queue::JudgeQueueConsumer;
use crate::sink::EventKind;
use crate::sink::OperationalEvent;
use crate::sink::OperationalSink;
use crate::verdict::VerdictPublisher;
use crate::verdict::failure_report;

// ============================================================================
// SECTION: Consumer
// ============================================================================

/// Owns the judge-topic consumer loop and the shared collaborators every
/// dispatched message needs.
pub struct Consumer {
    consumer: JudgeQueueConsumer,
    ctx: Arc<ProcessJudgeContext>,
    verdicts: Arc<VerdictPublisher>,
    sink: Arc<dyn OperationalSink>,
    max_attempts: u16,
    requeue_delay: Duration,
    touch_interval: Duration,
    concurrency: Arc<Semaphore>,
}

impl Consumer {
    /// Builds a consumer over `queue`, bounding in-flight handlers to
    /// `concurrent` and applying `max_attempts`/`requeue_delay`/
    /// `touch_interval` to every delivery.
    #[must_use]
    pub fn new(
        queue: JudgeQueueConsumer,
        ctx: Arc<ProcessJudgeContext>,
        verdicts: Arc<VerdictPublisher>,
        sink: Arc<dyn OperationalSink>,
        concurrent: u16,
        max_attempts: u16,
        requeue_delay: Duration,
        touch_interval: Duration,
    ) -> Self {
        Self {
            consumer: queue,
            ctx,
            verdicts,
            sink,
            max_attempts,
            requeue_delay,
            touch_interval,
            concurrency: Arc::new(Semaphore::new(usize::from(concurrent.max(1)))),
        }
    }

    /// Runs until the underlying NSQ connection closes, spawning one task
    /// per delivery bounded by the configured concurrency.
    pub async fn run(mut self) {
        while let Some(message) = self.consumer.next().await {
            let Ok(permit) = Arc::clone(&self.concurrency).acquire_owned().await else {
                continue;
            };
            let ctx = Arc::clone(&self.ctx);
            let verdicts = Arc::clone(&self.verdicts);
            let sink = Arc::clone(&self.sink);
            let max_attempts = self.max_attempts;
            let requeue_delay = self.requeue_delay;
            let touch_interval = self.touch_interval;
            tokio::spawn(async move {
                handle_message(message, &ctx, &verdicts, sink.as_ref(), max_attempts, requeue_delay, touch_interval).await;
                drop(permit);
            });
        }
    }
}

// ============================================================================
// SECTION: Message Handling
// ============================================================================

/// Handles one delivery end-to-end per §4.5.A steps 1–3.
async fn handle_message(
    message: InboundMessage,
    ctx: &ProcessJudgeContext,
    verdicts: &VerdictPublisher,
    sink: &dyn OperationalSink,
    max_attempts: u16,
    requeue_delay: Duration,
    touch_interval: Duration,
) {
    message.touch().await;
    let attempt = message.attempt();

    let judge_message: JudgeMessage = match serde_json::from_slice(message.body()) {
        Ok(parsed) => parsed,
        Err(_) => {
            if attempt >= max_attempts {
                message.finish().await;
            } else {
                message.requeue(Duration::ZERO).await;
            }
            return;
        }
    };

    if attempt > max_attempts {
        sink.record(OperationalEvent::new(EventKind::MaxAttemptsExceeded, judge_message.solution_id.to_string()));
        let report = failure_report(judge_message.solution_id, "max-attempts-exceeded", now_micros());
        let _ = verdicts.publish(report).await;
        message.finish().await;
        return;
    }

    let outcome = dispatch_with_touch(&message, ctx, &judge_message, touch_interval).await;

    match outcome {
        Ok(ProcessOutcome::Dispatched | ProcessOutcome::AlreadyInFlight) => {
            message.finish().await;
        }
        Err(err) => {
            sink.record(OperationalEvent::new(EventKind::ProcessJudgeFailed, format!("{}: {err}", judge_message.solution_id)));
            if attempt >= max_attempts {
                let report = failure_report(judge_message.solution_id, err, now_micros());
                let _ = verdicts.publish(report).await;
                message.finish().await;
            } else {
                let key = submission_lock_key(&ctx.lock_prefix, &judge_message.solution_id.to_string());
                let _ = ctx.lock.release(&key).await;
                message.requeue(requeue_delay).await;
            }
        }
    }
}

/// Races `process_judge` against a periodic touch, so a dispatch that takes
/// longer than one visibility window never silently drops out of flight.
async fn dispatch_with_touch(
    message: &InboundMessage,
    ctx: &ProcessJudgeContext,
    judge_message: &JudgeMessage,
    touch_interval: Duration,
) -> Result<ProcessOutcome, crate::error::OrchestratorError> {
    let mut work = std::pin::pin!(process_judge(ctx, judge_message));
    let touch_deadline = tokio::time::sleep(touch_interval);
    tokio::pin!(touch_deadline);
    loop {
        tokio::select! {
            outcome = &mut work => return outcome,
            () = &mut touch_deadline => {
                message.touch().await;
                touch_deadline.as_mut().reset(tokio::time::Instant::now() + touch_interval);
            }
        }
    }
}
