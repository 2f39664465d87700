// crates/hpcjudge-orchestrator/src/kvlock.rs
// ============================================================================
// Module: HPC Judge KV Lock
// Description: Redis-backed INCR+EXPIRE first-seen protocol used for the
// outer per-submission lock and the three watchers' event-dedupe keys.
// Purpose: Give every caller one atomic "am I first" check (§4.5, §9)
// without requiring a Redis transaction: `INCR` alone is atomic, and an
// unexpired window after a crash is tolerated per the design notes.
// Dependencies: redis (tokio-comp, connection-manager)
// ============================================================================

//! ## Overview
//! An `INCR` that returns `1` is the acquirer and must follow up with
//! `EXPIRE`; any caller that fails partway through its protected work must
//! `DEL` the key to release it for the next attempt. [`KvLock::release`]
//! reuses `DEL`'s return count (rows deleted) as the answer to "was this key
//! still held", which lets both the consumer's normal release-on-requeue
//! path and the command-report watchdog's "only fire if still held" check
//! share one primitive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use redis::AsyncCommands as _;
use redis::aio::ConnectionManager;

use crate::error::OrchestratorError;

// ============================================================================
// SECTION: Key Construction
// ============================================================================

/// Builds the outer submission lock key: `<prefix><solution-id>`.
#[must_use]
pub fn submission_lock_key(prefix: &str, solution_id: &str) -> String {
    format!("{prefix}{solution_id}")
}

/// Builds an event-dedupe key for a solution-bucket event:
/// `<prefix><solution-id><etag>`.
#[must_use]
pub fn solution_event_key(prefix: &str, solution_id: &str, etag: &str) -> String {
    format!("{prefix}{solution_id}{etag}")
}

/// Builds an event-dedupe key for a problem-intake event:
/// `<prefix>p.<problem-id><etag>`.
#[must_use]
pub fn problem_event_key(prefix: &str, problem_id: &str, etag: &str) -> String {
    format!("{prefix}p.{problem_id}{etag}")
}

// ============================================================================
// SECTION: Lock
// ============================================================================

/// A Redis connection bound to the orchestrator's configured key prefix.
#[derive(Clone)]
pub struct KvLock {
    connection: ConnectionManager,
}

impl KvLock {
    /// Wraps an established connection manager as a lock client.
    #[must_use]
    pub const fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Attempts to acquire `key` with the first-seen protocol: `INCR`, and
    /// if the post-increment value is `1`, follow with `EXPIRE ttl`. Returns
    /// `true` if this call won the race, `false` if `key` was already held
    /// by an earlier caller.
    ///
    /// If the `EXPIRE` half fails after a winning `INCR`, the key is
    /// immediately `DEL`eted so the acquisition does not leak as a
    /// permanently-held lock, and the failure is surfaced to the caller.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::KvLockUnavailable`] if Redis is
    /// unreachable. Per §7, callers must treat this the same as "already
    /// held" and refuse to proceed rather than risk a duplicate dispatch.
    pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool, OrchestratorError> {
        let mut connection = self.connection.clone();
        let count: i64 = connection.incr(key, 1).await?;
        if count != 1 {
            return Ok(false);
        }
        let expire_seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expired: Result<(), redis::RedisError> = connection.expire(key, expire_seconds).await;
        if let Err(err) = expired {
            let _: Result<i64, redis::RedisError> = connection.del(key).await;
            return Err(OrchestratorError::from(err));
        }
        Ok(true)
    }

    /// Releases `key` unconditionally, returning whether it was held at all.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::KvLockUnavailable`] if Redis is
    /// unreachable.
    pub async fn release(&self, key: &str) -> Result<bool, OrchestratorError> {
        let mut connection = self.connection.clone();
        let removed: i64 = connection.del(key).await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_lock_key_matches_prefix_solution_shape() {
        assert_eq!(submission_lock_key("hpcjudge:", "s-1"), "hpcjudge:s-1");
    }

    #[test]
    fn solution_event_key_appends_etag() {
        assert_eq!(solution_event_key("hpcjudge:", "s-1", "\"abc\""), "hpcjudge:s-1\"abc\"");
    }

    #[test]
    fn problem_event_key_uses_p_dot_discriminator() {
        assert_eq!(problem_event_key("hpcjudge:", "p-1", "\"xyz\""), "hpcjudge:p.p-1\"xyz\"");
    }
}
