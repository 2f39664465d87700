// crates/hpcjudge-orchestrator/src/watchers/mod.rs
// ============================================================================
// Module: HPC Judge Event Watchers
// Description: The three poll-based object-store event drainers (§4.5.B–D).
// Purpose: Share the key-parsing helper and the dedupe-then-process shape
// common to all three, since the distilled spec puts the object store's own
// native notification transport out of scope — every watcher here polls
// `ObjectStore::list_with_suffix` on a timer instead.
// Dependencies: uuid
// ============================================================================

pub mod command_watcher;
pub mod problem_intake_watcher;
pub mod result_watcher;

pub use command_watcher::CommandWatcher;
pub use problem_intake_watcher::ProblemIntakeWatcher;
pub use result_watcher::ResultWatcher;

use uuid::Uuid;

/// Strips `suffix` from an object key of the form `<solution-id>/<suffix>`
/// and parses the remaining prefix as a UUID. Returns `None` for a key that
/// does not have the expected shape, which a watcher treats as "not ours"
/// rather than an error — the bucket may hold other objects (e.g.
/// `artifact/<name>`) that happen to share a loose suffix match.
#[must_use]
pub fn solution_id_from_key(key: &str, suffix: &str) -> Option<Uuid> {
    let prefix = key.strip_suffix(suffix)?.strip_suffix('/')?;
    Uuid::parse_str(prefix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_solution_id_from_well_formed_key() {
        let id = Uuid::new_v4();
        let key = format!("{id}/result.json");
        assert_eq!(solution_id_from_key(&key, "result.json"), Some(id));
    }

    #[test]
    fn rejects_key_with_no_solution_id_segment() {
        assert_eq!(solution_id_from_key("result.json", "result.json"), None);
    }

    #[test]
    fn rejects_key_with_wrong_suffix() {
        let id = Uuid::new_v4();
        let key = format!("{id}/other.json");
        assert_eq!(solution_id_from_key(&key, "result.json"), None);
    }
}
