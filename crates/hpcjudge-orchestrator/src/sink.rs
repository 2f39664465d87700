// crates/hpcjudge-orchestrator/src/sink.rs
// ============================================================================
// Module: HPC Judge Orchestrator Operational Sink
// Description: Dependency-light, trait-based observability for the
// consumer, the three watchers, and the watchdog — mirrors
// `hpcjudge_discovery::sink` verbatim rather than introducing a
// tracing/log dependency this workspace otherwise avoids entirely.
// Purpose: Give every best-effort failure path (peer-less here, but the
// same idea: watcher poll errors, bridge dispatch failures, watchdog
// firings) somewhere to go, and expose `stats-judge-failed` as a plain
// counter per §4.5/§5.3.
// Dependencies: std
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Events
// ============================================================================

/// A stable label for the kind of thing that just happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// `ProcessJudge` failed after acquiring the submission lock.
    ProcessJudgeFailed,
    /// A judge message exceeded `max_attempts`; a failure verdict was published.
    MaxAttemptsExceeded,
    /// A watcher's object-store poll (list/get) failed; retried next tick.
    WatcherPollFailed,
    /// A command-report or judge-result payload failed to parse.
    MalformedEventPayload,
    /// The 2.5s watchdog fired: the judge script exited cleanly without
    /// publishing its own verdict.
    WatchdogFired,
    /// Releasing or acquiring a KV lock/dedupe key failed (redis unreachable).
    KvLockUnavailable,
    /// A verdict was published to the report topic.
    VerdictPublished,
}

impl EventKind {
    /// Stable string label, safe to use as a metric or log field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProcessJudgeFailed => "process-judge-failed",
            Self::MaxAttemptsExceeded => "max-attempts-exceeded",
            Self::WatcherPollFailed => "watcher-poll-failed",
            Self::MalformedEventPayload => "malformed-event-payload",
            Self::WatchdogFired => "watchdog-fired",
            Self::KvLockUnavailable => "kv-lock-unavailable",
            Self::VerdictPublished => "verdict-published",
        }
    }
}

/// One operational event, handed to an [`OperationalSink`].
#[derive(Debug, Clone)]
pub struct OperationalEvent {
    /// What kind of thing happened.
    pub kind: EventKind,
    /// Free-text detail, e.g. the solution id or the underlying error.
    pub detail: String,
}

impl OperationalEvent {
    /// Builds an event from a kind and a detail string.
    #[must_use]
    pub fn new(kind: EventKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Receives operational events the orchestrator chooses not to surface as
/// request failures (every watcher and the background watchdog run with no
/// caller to report to at all).
pub trait OperationalSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: OperationalEvent);

    /// Returns the current count of `stats-judge-failed`, if this sink
    /// tracks it. The default implementation reports zero; [`CountingSink`]
    /// overrides it.
    fn judge_failed_count(&self) -> u64 {
        0
    }
}

/// Discards every event. The default for tests.
#[derive(Debug, Default)]
pub struct NoopSink;

impl OperationalSink for NoopSink {
    fn record(&self, _event: OperationalEvent) {}
}

/// Writes each event as a single line to standard error.
#[derive(Debug, Default)]
pub struct StderrSink {
    judge_failed: AtomicU64,
}

impl OperationalSink for StderrSink {
    fn record(&self, event: OperationalEvent) {
        use std::io::Write as _;
        if matches!(event.kind, EventKind::ProcessJudgeFailed | EventKind::MaxAttemptsExceeded | EventKind::WatchdogFired) {
            self.judge_failed.fetch_add(1, Ordering::Relaxed);
        }
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "[judged] {}: {}", event.kind.as_str(), event.detail);
    }

    fn judge_failed_count(&self) -> u64 {
        self.judge_failed.load(Ordering::Relaxed)
    }
}

/// Counts events by kind without recording their detail text, exposing
/// `stats-judge-failed` as a plain `AtomicU64` (§4.5, §5.3) with no
/// Prometheus dependency.
#[derive(Debug, Default)]
pub struct CountingSink {
    process_judge_failed: AtomicU64,
    max_attempts_exceeded: AtomicU64,
    watcher_poll_failed: AtomicU64,
    malformed_event_payload: AtomicU64,
    watchdog_fired: AtomicU64,
    kv_lock_unavailable: AtomicU64,
    verdict_published: AtomicU64,
}

impl CountingSink {
    /// Returns the current count for `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> u64 {
        self.counter(kind).load(Ordering::Relaxed)
    }

    fn counter(&self, kind: EventKind) -> &AtomicU64 {
        match kind {
            EventKind::ProcessJudgeFailed => &self.process_judge_failed,
            EventKind::MaxAttemptsExceeded => &self.max_attempts_exceeded,
            EventKind::WatcherPollFailed => &self.watcher_poll_failed,
            EventKind::MalformedEventPayload => &self.malformed_event_payload,
            EventKind::WatchdogFired => &self.watchdog_fired,
            EventKind::KvLockUnavailable => &self.kv_lock_unavailable,
            EventKind::VerdictPublished => &self.verdict_published,
        }
    }
}

impl OperationalSink for CountingSink {
    fn record(&self, event: OperationalEvent) {
        self.counter(event.kind).fetch_add(1, Ordering::Relaxed);
    }

    /// `stats-judge-failed`: every event kind that corresponds to a
    /// published (or about-to-be-published) failure verdict.
    fn judge_failed_count(&self) -> u64 {
        self.count(EventKind::ProcessJudgeFailed) + self.count(EventKind::MaxAttemptsExceeded) + self.count(EventKind::WatchdogFired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_sink_tracks_judge_failed_across_kinds() {
        let sink = CountingSink::default();
        sink.record(OperationalEvent::new(EventKind::ProcessJudgeFailed, "s1"));
        sink.record(OperationalEvent::new(EventKind::WatchdogFired, "s2"));
        sink.record(OperationalEvent::new(EventKind::VerdictPublished, "s3"));
        assert_eq!(sink.judge_failed_count(), 2);
        assert_eq!(sink.count(EventKind::VerdictPublished), 1);
    }
}
