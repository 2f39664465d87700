// crates/hpcjudge-cli/src/commands.rs
// ============================================================================
// Module: HPC Judge Utility CLI Commands
// Description: The seven operations a judge script invokes this binary for,
// built on the context loaded from the judge-status file.
// Purpose: Keep each subcommand's logic testable without a clap `Cli` or a
// live bridge: path resolution is pure, uploads take a constructed
// `BridgeClient`.
// Dependencies: hpcjudge-core, hpcjudge-config, hpcjudge-bridge,
// hpcjudge-transport
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use hpcjudge_bridge::client::BridgeClient;
use hpcjudge_bridge::protocol::BucketType;
use hpcjudge_bridge::protocol::UploadFileRequest;
use hpcjudge_core::PartitionPath;
use hpcjudge_core::PartitionTable;
use hpcjudge_core::constants::ARTIFACT_DIR_NAME;
use hpcjudge_core::constants::JUDGE_REPORT_FILE;
use hpcjudge_core::constants::SOLUTION_FILE_NAME;
use hpcjudge_core::JudgeStatus;
use hpcjudge_config::CliConfig;
use hpcjudge_transport::SignedClient;

use crate::error::CliError;
use crate::mask;
use crate::status;

/// Environment variable the entrance's base environment sets to the
/// unprivileged user's own username (`hpcjudge_core::unixuser::base_environment`);
/// this is how an unprivileged CLI invocation learns which status file is
/// its own without a uid-to-name reverse lookup.
const USER_ENV_VAR: &str = "USER";

/// Name of the `home` partition the masking subcommands are scoped to.
const HOME_PARTITION: &str = "home";

// ============================================================================
// SECTION: Context
// ============================================================================

/// Everything a subcommand needs: the loaded config, the partition table
/// built from it, and the current submission's status.
pub struct CliContext {
    /// Loaded CLI configuration (bridge address, secret, partitions).
    pub config: CliConfig,
    /// Partition table built from `config.storage_path`.
    pub partitions: PartitionTable,
    /// The current submission's judge-status record.
    pub status: JudgeStatus,
}

impl CliContext {
    /// Loads configuration from `config_path`, resolves the current user
    /// from the `USER` environment variable, and reads that user's
    /// judge-status file.
    ///
    /// # Errors
    /// Returns [`CliError::MissingUser`] if `USER` is unset, a config
    /// error wrapped as [`CliError::Io`] if the config fails to load, or
    /// a status-lookup error otherwise.
    pub fn load(config_path: &Path) -> Result<Self, CliError> {
        let username = std::env::var(USER_ENV_VAR).map_err(|_| CliError::MissingUser)?;
        let config = hpcjudge_config::load_cli_config(config_path).map_err(|err| CliError::Io(err.to_string()))?;
        let roots = config.storage_path.iter().map(|(name, root)| (name.clone(), PathBuf::from(root))).collect();
        let partitions = PartitionTable::new(roots);
        let status_root = partitions.root("status")?;
        let status = status::read_status(status_root, &username)?;
        Ok(Self { config, partitions, status })
    }

    /// Builds a signed bridge client bound to this CLI's configured bridge
    /// address and secret key.
    fn bridge_client(&self) -> BridgeClient<SignedClient> {
        BridgeClient::new(SignedClient::new(self.config.bridge_address.clone(), self.config.secret_key.clone().into_bytes()))
    }
}

// ============================================================================
// SECTION: Path Printing
// ============================================================================

/// Returns the staged problem directory, optionally joined with `subpath`.
///
/// # Errors
/// Returns [`CliError::SubpathEscapes`] if `subpath` contains a
/// parent-directory component.
pub fn print_problem_path(ctx: &CliContext, subpath: Option<&str>) -> Result<PathBuf, CliError> {
    let base = ctx.status.problem_stored_to.clone();
    match subpath {
        Some(subpath) => {
            let joined = Path::new(subpath);
            if joined.components().any(|component| matches!(component, std::path::Component::ParentDir)) {
                return Err(CliError::SubpathEscapes);
            }
            Ok(base.join(joined))
        }
        None => Ok(base),
    }
}

/// Returns the submitted solution artefact's staged path, mirroring the
/// `${solution_path}` entrance-script token
/// (`hpcjudge_spawner::template::Replacer`).
///
/// # Errors
/// Returns [`CliError::UnknownPartition`] if `solution` is not configured.
pub fn print_solution_path(ctx: &CliContext) -> Result<PathBuf, CliError> {
    let root = ctx.partitions.root("solution")?;
    Ok(root.join(ctx.status.solution_id.to_string()).join(SOLUTION_FILE_NAME))
}

// ============================================================================
// SECTION: Bridge Uploads
// ============================================================================

/// Uploads the local file at `local_path` to
/// `solution/<solution-id>/result.json` through the local bridge.
///
/// # Errors
/// Returns [`CliError::PathOverflowsPartition`] if `local_path` is not
/// resident under any configured partition, or [`CliError::Transport`] if
/// the bridge call fails.
pub async fn report_result(ctx: &CliContext, local_path: &Path) -> Result<(), CliError> {
    let object_key = format!("{}/{JUDGE_REPORT_FILE}", ctx.status.solution_id);
    upload(ctx, local_path, object_key).await
}

/// Uploads the local file at `local_path` to
/// `solution/<solution-id>/artifact/<target>` through the local bridge.
///
/// # Errors
/// Returns the same conditions as [`report_result`].
pub async fn upload_artifact(ctx: &CliContext, local_path: &Path, target: &str) -> Result<(), CliError> {
    let object_key = format!("{}/{ARTIFACT_DIR_NAME}/{target}", ctx.status.solution_id);
    upload(ctx, local_path, object_key).await
}

/// Classifies `local_path` into a partition-qualified source and asks the
/// bridge to copy it to the solution bucket under `object_key`.
async fn upload(ctx: &CliContext, local_path: &Path, object_key: String) -> Result<(), CliError> {
    let source = classify(ctx, local_path)?;
    let request = UploadFileRequest { source, bucket: BucketType::Solution, object_key };
    ctx.bridge_client().upload_file(&request).await?;
    Ok(())
}

// ============================================================================
// SECTION: Masking
// ============================================================================

/// Hides `local_path` from the contestant entirely (chown root, mode 000).
///
/// # Errors
/// Returns [`CliError::WrongPartition`] if `local_path` is not under the
/// `home` partition, or a filesystem error otherwise.
pub fn mask_read(ctx: &CliContext, local_path: &Path) -> Result<(), CliError> {
    let path = classify_home(ctx, local_path)?;
    mask::mask_read(&ctx.partitions, &path)
}

/// Makes `local_path` read-only to the contestant (chown root, mode 444).
///
/// # Errors
/// Returns the same conditions as [`mask_read`].
pub fn mask_write(ctx: &CliContext, local_path: &Path) -> Result<(), CliError> {
    let path = classify_home(ctx, local_path)?;
    mask::mask_write(&ctx.partitions, &path)
}

/// Restores `local_path` to the submission's owning user (mode 600).
///
/// # Errors
/// Returns the same conditions as [`mask_read`].
pub fn unmask(ctx: &CliContext, local_path: &Path) -> Result<(), CliError> {
    let path = classify_home(ctx, local_path)?;
    mask::unmask(&ctx.partitions, &path, &ctx.status.username)
}

// ============================================================================
// SECTION: Path Classification
// ============================================================================

/// Maps a bare filesystem path onto its configured partition (§4.6).
fn classify(ctx: &CliContext, local_path: &Path) -> Result<PartitionPath, CliError> {
    Ok(ctx.partitions.classify(local_path)?)
}

/// Like [`classify`], but additionally requires the resolved partition to
/// be `home`, the scope masking operations are restricted to.
fn classify_home(ctx: &CliContext, local_path: &Path) -> Result<PartitionPath, CliError> {
    let path = classify(ctx, local_path)?;
    if path.partition != HOME_PARTITION {
        return Err(CliError::WrongPartition(HOME_PARTITION));
    }
    Ok(path)
}
