// crates/hpcjudge-spawner/src/bin/spawncmd.rs
// ============================================================================
// Module: HPC Judge Spawn Command Binary
// Description: Setuid-root entry point invoked by the bridge's
// execute-command on behalf of the judge orchestrator.
// Purpose: Enforce the canary-env-var and root-uid guards, then dispatch
// to `hpcjudge_spawner::Spawner::run_judge_script`.
// Dependencies: hpcjudge-spawner, hpcjudge-config, clap
// ============================================================================

use std::io::Write as _;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use hpcjudge_core::constants::SPAWN_CANARY_ENV_VAR;
use hpcjudge_core::constants::SPAWN_CANARY_VALUE;
use hpcjudge_spawner::RunJudgeScriptData;
use hpcjudge_spawner::Spawner;

/// `hpcjudge-spawncmd`: for internal usage only.
#[derive(Debug, Parser)]
#[command(name = "hpcjudge-spawncmd")]
struct Cli {
    /// Path to the spawner's YAML configuration file.
    #[arg(long)]
    config: std::path::PathBuf,
    /// Subcommand to run.
    #[command(subcommand)]
    command: SpawnCommand,
}

/// Subcommands exposed by the spawn binary.
#[derive(Debug, Subcommand)]
enum SpawnCommand {
    /// Executes a judge script for one submission.
    RunJudgeScript {
        /// Serialised [`RunJudgeScriptData`] JSON.
        #[arg(long)]
        data: String,
    },
}

fn main() -> ExitCode {
    let mut stderr = std::io::stderr();
    if std::env::var(SPAWN_CANARY_ENV_VAR).as_deref() != Ok(SPAWN_CANARY_VALUE) {
        let _ = writeln!(stderr, "hpcjudge-spawncmd must not be invoked directly.");
        return ExitCode::FAILURE;
    }
    if hpcjudge_core::unixuser::current_uid() != 0 {
        let _ = writeln!(stderr, "hpcjudge-spawncmd requires root permission.");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    let config = match hpcjudge_config::load_spawner_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            let _ = writeln!(stderr, "failed to load config: {err}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        SpawnCommand::RunJudgeScript { data } => run_judge_script(&config, &data),
    }
}

fn run_judge_script(config: &hpcjudge_config::SpawnerConfig, data: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let data: RunJudgeScriptData = match serde_json::from_str(data) {
        Ok(data) => data,
        Err(err) => {
            let _ = writeln!(stderr, "malformed run-judge-script data: {err}");
            return ExitCode::FAILURE;
        }
    };
    let spawner = Spawner::new(config.clone());
    match spawner.run_judge_script(&data) {
        Ok(status) => {
            if status.success() {
                ExitCode::SUCCESS
            } else {
                let code = status.code().and_then(|code| u8::try_from(code).ok()).unwrap_or(1);
                ExitCode::from(code)
            }
        }
        Err(err) => {
            let _ = writeln!(stderr, "run-judge-script failed: {err}");
            ExitCode::FAILURE
        }
    }
}
