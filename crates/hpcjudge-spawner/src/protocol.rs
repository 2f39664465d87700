// crates/hpcjudge-spawner/src/protocol.rs
// ============================================================================
// Module: HPC Judge Spawner Wire Data
// Description: The JSON payload the bridge's execute-command passes to
// `hpcjudge-spawncmd run-judge-script --data <json>`.
// Purpose: Carry everything `RunJudgeScript` needs in one value: which
// problem/solution, which unprivileged user, the entrance, resource limits,
// and whether to auto-remove the solution directory on completion.
// Dependencies: hpcjudge-core, serde, uuid
// ============================================================================

use hpcjudge_core::Entrance;
use hpcjudge_core::ResourceControl;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Everything `run-judge-script` needs to stage, spawn, and clean up one
/// submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunJudgeScriptData {
    /// Problem identifier.
    pub problem_id: String,
    /// Submission identifier.
    pub solution_id: Uuid,
    /// Unprivileged unix user the entrance runs as.
    pub username: String,
    /// Resource limits; defaults to `{cpu: 100, memory: 1024}` if the
    /// caller omits one.
    #[serde(default)]
    pub resource_control: ResourceControl,
    /// How to invoke the judge: inline command or templated script path.
    pub entrance: Entrance,
    /// Whether to `rm -rf` the solution directory and wipe the user's home
    /// once the entrance has exited.
    #[serde(default)]
    pub auto_remove_solution: bool,
}
