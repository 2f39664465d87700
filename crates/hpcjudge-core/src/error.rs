// crates/hpcjudge-core/src/error.rs
// ============================================================================
// Module: HPC Judge Core Errors
// Description: Error vocabulary shared by every crate that builds on top of
// the core data model (partition resolution, envelope parsing).
// Purpose: Give path confinement and wire parsing one stable error type.
// Dependencies: thiserror
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Failure modes that originate in `hpcjudge-core` itself, as opposed to the
/// service-specific errors each downstream crate defines for its own
/// concerns (transport, discovery, bridge, spawner, orchestrator).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The referenced partition name is not present in the partition table.
    #[error("unknown partition: {0}")]
    UnknownPartition(String),

    /// A partition-qualified path normalised outside its partition root, or
    /// contained a component that would have escaped it (`..`, an absolute
    /// override, or a symlink crossing the boundary).
    #[error("path overflows partition path")]
    PathOverflowsPartition,

    /// Opening or creating a directory on the resolved path failed.
    #[error("io error resolving partition path: {0}")]
    Io(String),

    /// The supplied relative path was empty or otherwise not a valid
    /// candidate for resolution.
    #[error("invalid partition-relative path: {}", .0.display())]
    InvalidRelativePath(PathBuf),

    /// A requested unix username does not resolve via `getpwnam_r`.
    #[error("unknown unix user: {0}")]
    UnknownUser(String),
}
