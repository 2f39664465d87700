// crates/hpcjudge-core/src/constants.rs
// ============================================================================
// Module: HPC Judge Wire Constants
// Description: Object keys, discovery type tags, and file modes shared by
// every crate that touches the object store or the discovery mesh.
// Purpose: Keep the handful of literal strings and numeric modes that tie
// the system together in one place instead of scattered across crates.
// Dependencies: none
// ============================================================================

/// Object key under `solution/<solution-id>/` carrying the bridge's async
/// command execution report.
pub const RUN_COMMAND_REPORT_FILE: &str = "run-command-report.json";

/// Object key under `solution/<solution-id>/` carrying the judge script's
/// own verdict.
pub const JUDGE_REPORT_FILE: &str = "result.json";

/// Object key under `solution/<solution-id>/` carrying the submitted
/// solution artefact after the bridge fetches it.
pub const SOLUTION_FILE_NAME: &str = "solution.dat";

/// Object key under `problem/<problem-id>/` carrying the raw problem
/// data archive uploaded by the intake path.
pub const PROBLEM_DATA_FILE: &str = "data.tar";

/// Object key under `problem/<problem-id>/` carrying the parsed problem
/// descriptor extracted from [`PROBLEM_DATA_FILE`].
pub const PROBLEM_DESCRIPTOR_FILE: &str = "problem.toml";

/// Discovery type tag advertised by judge orchestrator nodes.
pub const HPC_JUDGE_DISCOVERY_TYPE: &str = "hpc-judge";

/// Discovery type tag advertised by bridge nodes.
pub const HPC_BRIDGE_DISCOVERY_TYPE: &str = "hpc-bridge";

/// Temporary file name used by the problem-data intake watcher while
/// staging a fresh archive onto a bridge partition.
pub const PROBLEM_DATA_TMP_FILE: &str = "problem_tmp_data.tar";

/// Mode applied to the judge status file (`§6`): owned by root, readable
/// and writable only by its owner.
pub const JUDGE_STATUS_FILE_MODE: u32 = 0o600;

/// Mode applied to a user's home directory created on first use.
pub const HOME_DIR_MODE: u32 = 0o700;

/// Mode applied to the staged per-submission problem directory once
/// handed to the unprivileged user.
pub const STAGED_PROBLEM_DIR_MODE: u32 = 0o700;

/// Mode applied to the solution directory so the spawned user can read
/// the solution blob.
pub const SOLUTION_DIR_MODE: u32 = 0o755;

/// Mode applied to a generated judge script before it is executed.
pub const JUDGE_SCRIPT_MODE: u32 = 0o755;

/// cgroup v1 `cpu.cfs_period_us` value used for every submission, per §4.4.
pub const CGROUP_CFS_PERIOD_US: i64 = 50_000;

/// Default CPU percentage applied when a problem descriptor supplies none.
pub const DEFAULT_CPU_PERCENT: i64 = 100;

/// Default memory cap, in MiB, applied when a problem descriptor supplies none.
pub const DEFAULT_MEMORY_MB: i64 = 1024;

/// Watchdog delay (§4.5.C) after a successful async command exit before a
/// missing `done` verdict is treated as a failure.
pub const WATCHDOG_DELAY_MS: u64 = 2_500;

/// Back-dating applied to a watchdog-issued failure verdict's timestamp so a
/// real, slightly-late verdict from the judge script still wins downstream
/// ordering. Deliberate per spec §9 — do not "fix".
pub const WATCHDOG_BACKDATE_MS: i64 = 100;

/// Interval between `Noop` keepalives sent over a discovery register
/// channel by a service holding its registration open.
pub const DISCOVERY_REGISTER_KEEPALIVE_SECS: u64 = 30;

/// Environment variable the orchestrator sets when it asks a bridge to
/// invoke the spawn binary; `hpcjudge-spawncmd` refuses to run unless this
/// variable is present and equal to [`SPAWN_CANARY_VALUE`], rejecting
/// direct invocation by an ordinary user who happens to hold the setuid
/// binary's path.
pub const SPAWN_CANARY_ENV_VAR: &str = "HPCJUDGE_SPAWN_CANARY";

/// Required value of [`SPAWN_CANARY_ENV_VAR`].
pub const SPAWN_CANARY_VALUE: &str = "hpcjudge-internal-spawn-v1";

/// Directory under `solution/<solution-id>/` the utility CLI's
/// `upload-artifact` subcommand uploads into.
pub const ARTIFACT_DIR_NAME: &str = "artifact";
