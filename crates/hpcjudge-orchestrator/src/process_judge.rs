// crates/hpcjudge-orchestrator/src/process_judge.rs
// ============================================================================
// Module: HPC Judge ProcessJudge
// Description: The seven-step dispatch that turns one inbound judge message
// into an asynchronous bridge execute-command (§4.5.A.4).
// Purpose: Acquire the at-most-once lock, resolve the problem and a
// matching bridge, stage the solution, and fire off the sandboxed judge
// script — without blocking on its completion, which is correlated later
// by the result and command-report watchers.
// Dependencies: hpcjudge-core, hpcjudge-bridge, hpcjudge-transport,
// hpcjudge-discovery, hpcjudge-config
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use hpcjudge_bridge::client::BridgeClient;
use hpcjudge_bridge::protocol::ExecuteCommandRequest;
use hpcjudge_bridge::protocol::FetchObjectRequest;
use hpcjudge_core::JudgeMessage;
use hpcjudge_core::PartitionPath;
use hpcjudge_core::QueryParameters;
use hpcjudge_core::ResourceControl;
use hpcjudge_core::constants::HPC_BRIDGE_DISCOVERY_TYPE;
use hpcjudge_core::constants::RUN_COMMAND_REPORT_FILE;
use hpcjudge_core::constants::SOLUTION_FILE_NAME;
use hpcjudge_core::constants::SPAWN_CANARY_ENV_VAR;
use hpcjudge_core::constants::SPAWN_CANARY_VALUE;
use hpcjudge_discovery::Client as DiscoveryClient;
use hpcjudge_transport::DiscoveryBackedClient;

use crate::error::OrchestratorError;
use crate::kvlock::KvLock;
use crate::kvlock::submission_lock_key;
use crate::objectstore::ObjectStore;
use crate::problem;

// ============================================================================
// SECTION: Context
// ============================================================================

/// Everything `process_judge` needs to dispatch one submission, shared
/// across every worker and watcher in the orchestrator process.
pub struct ProcessJudgeContext {
    /// Object store bound to the problem and solution buckets.
    pub objectstore: ObjectStore,
    /// Redis-backed at-most-once lock.
    pub lock: KvLock,
    /// Key prefix applied to every lock/dedupe key.
    pub lock_prefix: String,
    /// TTL applied to the outer submission lock.
    pub lock_ttl: Duration,
    /// Discovery client used to find a matching bridge.
    pub discovery: DiscoveryClient,
    /// HMAC secret shared with bridges.
    pub secret_key: Vec<u8>,
    /// Path to the spawn binary and its config on the bridge's filesystem.
    pub spawn_command: hpcjudge_config::SpawnCommandConfig,
}

/// Outcome of one `process_judge` call that did acquire the lock, so the
/// caller can tell "dispatched" apart from "another worker already owns
/// this submission" without inspecting the lock itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// This call dispatched the bridge and holds the outer lock until a
    /// watcher (or the watchdog) clears it.
    Dispatched,
    /// Another attempt already holds the lock; no work was done.
    AlreadyInFlight,
}

// ============================================================================
// SECTION: ProcessJudge
// ============================================================================

/// Implements the seven `ProcessJudge` steps against `message`.
///
/// # Errors
/// Returns [`OrchestratorError`] on any failure past lock acquisition —
/// descriptor load, bridge resolution, presigning, or the bridge calls
/// themselves. The lock is deliberately left held on error: the caller
/// (the queue consumer) decides whether to release it for a retry or to
/// leave it so a terminal failure verdict, once published, is the only
/// thing that clears it.
pub async fn process_judge(ctx: &ProcessJudgeContext, message: &JudgeMessage) -> Result<ProcessOutcome, OrchestratorError> {
    let solution_id = message.solution_id.to_string();
    let lock_key = submission_lock_key(&ctx.lock_prefix, &solution_id);
    if !ctx.lock.acquire(&lock_key, ctx.lock_ttl).await? {
        return Ok(ProcessOutcome::AlreadyInFlight);
    }

    let descriptor = problem::load_descriptor(&ctx.objectstore, &message.problem_id).await?;

    let query = QueryParameters {
        kind: Some(HPC_BRIDGE_DISCOVERY_TYPE.to_string()),
        tags: descriptor.environment.tags.clone(),
        exclude_tags: descriptor.environment.exclude_tags.clone(),
        ..QueryParameters::default()
    };
    let transport = DiscoveryBackedClient::new(ctx.discovery.clone(), query, ctx.secret_key.clone());
    let bridge = BridgeClient::new(transport);

    let solution_key = format!("{solution_id}/{SOLUTION_FILE_NAME}");
    let get_url = ctx.objectstore.presigned_get(ctx.objectstore.solution_bucket(), &solution_key).await?;
    bridge
        .fetch_object(&FetchObjectRequest {
            source_url: get_url,
            destination: PartitionPath::new("solution", format!("{solution_id}/{SOLUTION_FILE_NAME}")),
            owner: Some(message.username.clone()),
            mode: Some(0o600),
        })
        .await?;

    let run_data = hpcjudge_spawner::RunJudgeScriptData {
        problem_id: message.problem_id.clone(),
        solution_id: message.solution_id,
        username: message.username.clone(),
        resource_control: ResourceControl {
            cpu: descriptor.environment.cpu_percent.unwrap_or(hpcjudge_core::constants::DEFAULT_CPU_PERCENT),
            memory: descriptor.environment.memory_mb.unwrap_or(hpcjudge_core::constants::DEFAULT_MEMORY_MB),
        },
        entrance: descriptor.entrance.clone(),
        auto_remove_solution: true,
    };
    let run_data_json = serde_json::to_string(&run_data)?;

    let report_key = format!("{solution_id}/{RUN_COMMAND_REPORT_FILE}");
    let put_url = ctx.objectstore.presigned_put(ctx.objectstore.solution_bucket(), &report_key).await?;

    bridge
        .execute_command(&ExecuteCommandRequest {
            command: ctx.spawn_command.binary.clone(),
            arguments: vec![
                "--config".to_string(),
                ctx.spawn_command.config_path.clone(),
                "run-judge-script".to_string(),
                "--data".to_string(),
                run_data_json,
            ],
            work_directory: PartitionPath::new("home", message.username.clone()),
            user: "root".to_string(),
            env: vec![(SPAWN_CANARY_ENV_VAR.to_string(), SPAWN_CANARY_VALUE.to_string())],
            r#async: true,
            report_url: Some(put_url),
        })
        .await?;

    Ok(ProcessOutcome::Dispatched)
}
