// crates/hpcjudge-cli/src/mask.rs
// ============================================================================
// Module: HPC Judge Path Masking
// Description: chown+chmod primitives a problem script uses to hide or
// protect private data inside the unprivileged user's home before handing
// control to the contestant-visible entrance.
// Purpose: Give `mask-read`/`mask-write`/`unmask` one shared, symlink-safe
// implementation built on `PartitionTable::open_parent`, the same anchor
// the bridge's own `upload-file` handler uses to fchmod/fchown a freshly
// written file (`hpcjudge_bridge::operations::write_partition_path`).
// Dependencies: hpcjudge-core
// ============================================================================

use hpcjudge_core::PartitionPath;
use hpcjudge_core::PartitionTable;
use hpcjudge_core::unixuser;

use crate::error::CliError;

/// Mode applied by `mask-read`: root-owned, no access for anyone else.
/// Hides a file's contents (and its writability) from the contestant.
const MASK_READ_MODE: u32 = 0o000;

/// Mode applied by `mask-write`: root-owned, world-readable but not
/// writable. Leaves a file visible but tamper-proof.
const MASK_WRITE_MODE: u32 = 0o444;

/// Mode restored by `unmask`: private read-write access for the owning
/// user, matching the mode a freshly staged solution file is given.
const UNMASK_MODE: u32 = 0o600;

/// Applies [`MASK_READ_MODE`], owned by root, to `path`.
///
/// # Errors
/// Returns [`CliError`] if `path` does not resolve under `partitions`, or
/// if opening/chowning/chmoding the resolved entry fails.
pub fn mask_read(partitions: &PartitionTable, path: &PartitionPath) -> Result<(), CliError> {
    apply(partitions, path, 0, 0, MASK_READ_MODE)
}

/// Applies [`MASK_WRITE_MODE`], owned by root, to `path`.
///
/// # Errors
/// Returns [`CliError`] under the same conditions as [`mask_read`].
pub fn mask_write(partitions: &PartitionTable, path: &PartitionPath) -> Result<(), CliError> {
    apply(partitions, path, 0, 0, MASK_WRITE_MODE)
}

/// Restores `path` to [`UNMASK_MODE`], owned by `username`.
///
/// # Errors
/// Returns [`CliError`] under the same conditions as [`mask_read`], plus
/// [`CliError::Io`] if `username` does not resolve.
pub fn unmask(partitions: &PartitionTable, path: &PartitionPath, username: &str) -> Result<(), CliError> {
    let user = unixuser::resolve_user(username)?;
    apply(partitions, path, user.uid, user.gid, UNMASK_MODE)
}

/// Opens `path`'s parent through a capability-scoped, non-symlink-following
/// handle and fchowns/fchmods the resolved leaf, never re-resolving the
/// path by name after the walk (no TOCTOU window for a planted symlink).
fn apply(partitions: &PartitionTable, path: &PartitionPath, uid: u32, gid: u32, mode: u32) -> Result<(), CliError> {
    let (parent, leaf) = partitions.open_parent(path, false)?;
    let file = parent.open(&leaf).map_err(|err| CliError::Io(err.to_string()))?;
    unixuser::fchown_fd(&file, uid, gid)?;
    unixuser::fchmod_fd(&file, mode)?;
    Ok(())
}
