// crates/hpcjudge-cli/src/bin/cli.rs
// ============================================================================
// Module: HPC Judge Utility CLI Binary
// Description: Setuid-root entry point invoked by judge scripts to learn
// their submission's paths and report results/artefacts/masking back
// through the local bridge.
// Purpose: Enforce the root-uid guard, parse the subcommand, and dispatch
// to `hpcjudge_cli::commands`.
// Dependencies: hpcjudge-cli, clap, tokio
// ============================================================================

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use hpcjudge_cli::CliContext;
use hpcjudge_cli::commands;

/// `hpcjudge-cli`: invoked from within a running judge script.
#[derive(Debug, Parser)]
#[command(name = "hpcjudge-cli")]
struct Cli {
    /// Path to the CLI's YAML configuration file.
    #[arg(long)]
    config: PathBuf,
    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Subcommands exposed to judge scripts.
#[derive(Debug, Subcommand)]
enum Command {
    /// Prints the staged problem directory, optionally joined with a
    /// subpath.
    PrintProblemPath {
        /// Optional path joined onto the staged problem directory.
        subpath: Option<String>,
    },
    /// Prints the submitted solution artefact's staged path.
    PrintSolutionPath,
    /// Uploads a local file as this submission's verdict.
    ReportResult {
        /// Local path to the `result.json`-shaped file to upload.
        path: PathBuf,
    },
    /// Uploads a local file as a named artefact under this submission.
    UploadArtifact {
        /// Local path to upload.
        path: PathBuf,
        /// Destination artefact name.
        target: String,
    },
    /// Hides a path from the contestant entirely.
    MaskRead {
        /// Local path, must resolve under the `home` partition.
        path: PathBuf,
    },
    /// Makes a path read-only to the contestant.
    MaskWrite {
        /// Local path, must resolve under the `home` partition.
        path: PathBuf,
    },
    /// Restores a path to the submission's owning user.
    Unmask {
        /// Local path, must resolve under the `home` partition.
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let mut stderr = std::io::stderr();
    if hpcjudge_core::unixuser::current_uid() != 0 {
        let _ = writeln!(stderr, "hpcjudge-cli requires root permission.");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            let _ = writeln!(stderr, "failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(&cli))
}

async fn run(cli: &Cli) -> ExitCode {
    let mut stderr = std::io::stderr();
    let ctx = match CliContext::load(&cli.config) {
        Ok(ctx) => ctx,
        Err(err) => {
            let _ = writeln!(stderr, "failed to load submission context: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Command::PrintProblemPath { subpath } => commands::print_problem_path(&ctx, subpath.as_deref()).map(print_path),
        Command::PrintSolutionPath => commands::print_solution_path(&ctx).map(print_path),
        Command::ReportResult { path } => commands::report_result(&ctx, path).await,
        Command::UploadArtifact { path, target } => commands::upload_artifact(&ctx, path, target).await,
        Command::MaskRead { path } => commands::mask_read(&ctx, path),
        Command::MaskWrite { path } => commands::mask_write(&ctx, path),
        Command::Unmask { path } => commands::unmask(&ctx, path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(stderr, "{err}");
            ExitCode::FAILURE
        }
    }
}

/// Prints a resolved path to stdout, the judge script's intended
/// consumption point (command substitution).
fn print_path(path: PathBuf) {
    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "{}", path.display());
}
