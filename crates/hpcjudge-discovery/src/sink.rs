// crates/hpcjudge-discovery/src/sink.rs
// ============================================================================
// Module: HPC Judge Discovery Operational Sink
// Description: Dependency-light, trait-based observability for the
// discovery node's best-effort peer fanout and bootstrap paths.
// Purpose: Give peer failures and propagation outcomes somewhere to go
// without surfacing them to the originating caller, and without pulling
// in a tracing/log crate the rest of the fleet does not use either.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Peer propagation is explicitly best-effort (§4.1): a peer that is down
//! for the duration of one RPC is logged and skipped, never retried or
//! surfaced to the mutation's originator. [`OperationalSink`] is
//! intentionally dependency-light so a deployment can plug in whatever it
//! already uses for structured logs without this crate picking a winner.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Events
// ============================================================================

/// A stable label for the kind of thing that just happened, so a sink
/// implementation can route without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// A peer RPC (add/delete fanout, or bootstrap sync) failed.
    PeerRequestFailed,
    /// Bootstrap against a configured peer succeeded.
    BootstrapSucceeded,
    /// The register channel for a service was dropped; its registration
    /// was deleted as a result.
    RegisterSessionClosed,
    /// An inbound request failed its access-key check.
    AccessDenied,
}

impl EventKind {
    /// Stable string label, safe to use as a metric or log field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PeerRequestFailed => "peer-request-failed",
            Self::BootstrapSucceeded => "bootstrap-succeeded",
            Self::RegisterSessionClosed => "register-session-closed",
            Self::AccessDenied => "access-denied",
        }
    }
}

/// One operational event, handed to an [`OperationalSink`].
#[derive(Debug, Clone)]
pub struct OperationalEvent {
    /// What kind of thing happened.
    pub kind: EventKind,
    /// Free-text detail, e.g. the peer address or the failing service id.
    pub detail: String,
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Receives operational events the discovery node chooses not to
/// surface as request failures.
pub trait OperationalSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: OperationalEvent);
}

/// Discards every event. The default for tests and minimal deployments.
#[derive(Debug, Default)]
pub struct NoopSink;

impl OperationalSink for NoopSink {
    fn record(&self, _event: OperationalEvent) {}
}

/// Writes each event as a single line to standard error.
#[derive(Debug, Default)]
pub struct StderrSink;

impl OperationalSink for StderrSink {
    fn record(&self, event: OperationalEvent) {
        use std::io::Write as _;
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "[discovery] {}: {}", event.kind.as_str(), event.detail);
    }
}

/// Counts events by kind without recording their detail text, for cheap
/// in-process statistics (`stats-*` counters referenced elsewhere in the
/// fleet follow the same pattern).
#[derive(Debug, Default)]
pub struct CountingSink {
    peer_request_failed: AtomicU64,
    bootstrap_succeeded: AtomicU64,
    register_session_closed: AtomicU64,
    access_denied: AtomicU64,
}

impl CountingSink {
    /// Returns the current count for `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> u64 {
        self.counter(kind).load(Ordering::Relaxed)
    }

    fn counter(&self, kind: EventKind) -> &AtomicU64 {
        match kind {
            EventKind::PeerRequestFailed => &self.peer_request_failed,
            EventKind::BootstrapSucceeded => &self.bootstrap_succeeded,
            EventKind::RegisterSessionClosed => &self.register_session_closed,
            EventKind::AccessDenied => &self.access_denied,
        }
    }
}

impl OperationalSink for CountingSink {
    fn record(&self, event: OperationalEvent) {
        self.counter(event.kind).fetch_add(1, Ordering::Relaxed);
    }
}
