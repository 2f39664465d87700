// crates/hpcjudge-core/src/model.rs
// ============================================================================
// Module: HPC Judge Data Model
// Description: Services, queries, queue messages, problem descriptors, and
// the judge status file layout.
// Purpose: One canonical set of wire types shared by discovery, transport,
// bridge, spawner, orchestrator, and the utility CLI.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Every type here round-trips through JSON or TOML exactly as described in
//! the external interfaces section: field names are `snake_case` on the
//! wire via `serde(rename_all = "snake_case")` where the original used
//! lower-camel JSON, and via bare field names where the Go struct already
//! used snake-ish lowercase tags.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Service Identity
// ============================================================================

/// Stable identifier for a service advertised in the discovery mesh.
///
/// # Invariants
/// - Unique across a single discovery node (enforced by [`crate::partition`]
///   callers are not involved here; discovery enforces it on insert).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(Uuid);

impl ServiceId {
    /// Mints a fresh, random service identifier.
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID as a service identifier.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub const fn get(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An advertised endpoint in the discovery mesh.
///
/// # Invariants
/// - `id` is unique within a single discovery node.
/// - Within a single node, the pair (`address`, `kind`) implies a unique
///   `id` on first insert (enforced by the normalisation rule in the
///   discovery crate, not here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Stable identifier, assigned by the discovery node on first insert.
    pub id: ServiceId,
    /// Reachable address (base URL) for this service.
    pub address: String,
    /// Type tag, e.g. `hpc-bridge` or `hpc-judge`.
    pub kind: String,
    /// Free-form routing tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Service {
    /// Reports whether this service carries every tag in `required` and
    /// none of the tags in `excluded`.
    #[must_use]
    pub fn matches_tags(&self, required: &BTreeSet<String>, excluded: &BTreeSet<String>) -> bool {
        required.is_subset(&self.tags) && self.tags.is_disjoint(excluded)
    }
}

/// A filter used by `query`/`list` operations against the discovery mesh.
///
/// Semantics: every populated field narrows the candidate set (logical AND);
/// `tags` is a required-subset predicate, `exclude_tags` a disjointness
/// predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameters {
    /// Narrow to an exact service id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ServiceId>,
    /// Narrow to an exact address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Narrow to a single type tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Required tags (AND).
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Tags that must be absent.
    #[serde(default)]
    pub exclude_tags: BTreeSet<String>,
}

/// A peer discovery node's base URL. Node-local state, never serialised as
/// part of a service record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Peer(pub String);

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Queue Messages
// ============================================================================

/// Inbound payload on the `judge` queue topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeMessage {
    /// Problem identifier, keys `problem/<problem_id>/...` in the object store.
    pub problem_id: String,
    /// Submission identifier. Internal code calls this `solution_id` to
    /// match the `solution/<solution_id>/...` object-store layout; the wire
    /// JSON key remains `submission_id` per the original queue contract.
    #[serde(rename = "submission_id")]
    pub solution_id: Uuid,
    /// Extra arguments forwarded to the spawner's entrance command.
    #[serde(default)]
    pub runner_args: Vec<String>,
    /// Unprivileged unix user under which the judge script runs.
    pub username: String,
}

/// Outbound payload on the `report` queue topic: a verdict for a submission.
///
/// # Invariants
/// - A given (`solution_id`, `done = true`) is published at most once under
///   normal operation, enforced by the orchestrator's KV lock release tied
///   to `done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMessage {
    /// Submission this verdict concerns.
    pub submission_id: Uuid,
    /// Whether the submission judged successfully.
    pub success: bool,
    /// Error detail when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether this verdict is terminal for the submission.
    pub done: bool,
    /// Integer score.
    pub score: i64,
    /// Human-readable verdict message.
    pub message: String,
    /// Publish timestamp, microseconds since the Unix epoch.
    pub timestamp: i64,
}

// ============================================================================
// SECTION: Problem Descriptor
// ============================================================================

/// Either an inline shell command or a script path relative to the staged
/// problem directory, unifying the two entrance forms from the original
/// Go descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entrance {
    /// Run via `bash -c <command>`.
    Command(String),
    /// Read, template-substitute, and run the named script file.
    Script(String),
}

/// Per-problem routing and resource constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Tags a candidate bridge must carry.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Tags a candidate bridge must not carry.
    #[serde(default)]
    pub exclude_tags: BTreeSet<String>,
    /// CPU percentage cap for the judge script (100 = one full core).
    #[serde(default)]
    pub cpu_percent: Option<i64>,
    /// Memory cap, in MiB, for the judge script.
    #[serde(default)]
    pub memory_mb: Option<i64>,
    /// Advisory resource estimate surfaced to schedulers; not enforced.
    #[serde(default)]
    pub resource_estimate: Option<String>,
}

/// `<bucket>/<problem-id>/problem.toml`: the problem descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDescriptor {
    /// Problem identifier, normally matching the enclosing object key.
    pub id: String,
    /// Human-readable problem name.
    #[serde(default)]
    pub name: String,
    /// How to invoke the judge.
    pub entrance: Entrance,
    /// Routing and resource constraints.
    #[serde(default)]
    pub environment: Environment,
}

/// Resource limits applied to a single judge script invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceControl {
    /// CPU percentage (100 = one full core).
    pub cpu: i64,
    /// Memory cap in MiB.
    pub memory: i64,
}

impl Default for ResourceControl {
    fn default() -> Self {
        Self {
            cpu: crate::constants::DEFAULT_CPU_PERCENT,
            memory: crate::constants::DEFAULT_MEMORY_MB,
        }
    }
}

// ============================================================================
// SECTION: Judge Status File
// ============================================================================

/// `<status-partition>/<username>.judge.json`: local context the utility
/// CLI reads to learn the current submission.
///
/// # Invariants
/// - Root-owned, mode 0600.
/// - Created before script execution, removed on any exit path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeStatus {
    /// Problem being judged.
    pub problem_id: String,
    /// Submission being judged.
    pub solution_id: Uuid,
    /// Entrance process id, or -1 before the process is spawned.
    pub entrance_pid: i64,
    /// Absolute path to the staged per-submission problem directory.
    pub problem_stored_to: PathBuf,
    /// Unprivileged user the entrance runs as.
    pub username: String,
}

// ============================================================================
// SECTION: Result Objects
// ============================================================================

/// A single subtask's contribution to a [`JudgeResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeSubtaskResult {
    /// Subtask identifier, problem-defined.
    pub id: String,
    /// Subtask score.
    pub score: i64,
    /// Human-readable subtask message.
    #[serde(default)]
    pub message: String,
}

/// `solution/<solution-id>/result.json`: the verdict a judge script
/// produces directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeResult {
    /// Whether this verdict is terminal.
    pub done: bool,
    /// Integer score.
    pub score: i64,
    /// Human-readable summary message.
    #[serde(default)]
    pub message: String,
    /// Optional longer-form detail, not surfaced to end users by default.
    #[serde(default)]
    pub detailed_message: Option<String>,
    /// Per-subtask breakdown.
    #[serde(default)]
    pub subtasks: Vec<JudgeSubtaskResult>,
}

/// `solution/<solution-id>/run-command-report.json`: the bridge's async
/// command execution report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteCommandReport {
    /// Whether the bridge managed to spawn and run the command at all.
    pub success: bool,
    /// Process exit status; meaningless if `success` is false.
    pub exit_status: i32,
    /// Captured standard output.
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error.
    #[serde(default)]
    pub stderr: String,
    /// Error detail when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
