// crates/hpcjudge-spawner/src/cgroup.rs
// ============================================================================
// Module: HPC Judge Cgroup Control
// Description: cgroup v1 creation, pid attachment, and deletion for a single
// submission's resource isolation (CPU quota + memory limit).
// Purpose: Mirror the Go `cgroup1.New`/`cg.AddProc`/`cg.Delete` lifecycle
// without a cgroups crate dependency — it's three files under a derived
// directory, which plain `std::fs` expresses directly.
// Dependencies: hpcjudge-core (path math only), std::fs
// ============================================================================

//! ## Overview
//! cgroup v1's CPU and memory controllers each expose a directory under
//! `<cgroup-base>/<controller>/<path>` containing control files; creating
//! the directory creates the cgroup, writing to `cgroup.procs` attaches a
//! process, and removing the directory deletes it (the kernel refuses the
//! `rmdir` while it still holds live processes, which is exactly the
//! ordering invariant P6 depends on: delete only after the process exits or
//! attachment itself failed).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use hpcjudge_core::constants::CGROUP_CFS_PERIOD_US;
use hpcjudge_core::ResourceControl;

use crate::error::SpawnerError;

/// Directory name of the cgroup v1 CPU controller under the cgroup root.
const CPU_CONTROLLER: &str = "cpu";
/// Directory name of the cgroup v1 memory controller under the cgroup root.
const MEMORY_CONTROLLER: &str = "memory";
/// Bytes a sanitised submission id is allowed to contain; every other byte
/// is replaced with `-`.
const SUBMISSION_ID_ALLOWED: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890-_.";

// ============================================================================
// SECTION: Submission Id Sanitisation
// ============================================================================

/// Replaces every byte of `submission_id` outside `[A-Za-z0-9._-]` with `-`,
/// so the sanitised string is safe to use as a single path component under
/// the cgroup base directory.
#[must_use]
pub fn sanitize_submission_id(submission_id: &str) -> String {
    submission_id
        .bytes()
        .map(|byte| if SUBMISSION_ID_ALLOWED.contains(&byte) { byte } else { b'-' })
        .map(char::from)
        .collect()
}

// ============================================================================
// SECTION: Cgroup Handle
// ============================================================================

/// A created-but-not-yet-deleted cgroup for one submission, across both
/// controllers. Dropping a handle that was never explicitly deleted still
/// attempts best-effort cleanup (P6: every path, successful or failed, must
/// not leave an orphan cgroup), though callers should prefer the explicit
/// async-aware [`CgroupHandle::delete`] since `Drop` cannot report errors.
pub struct CgroupHandle {
    /// This submission's directory under the CPU controller.
    cpu_path: PathBuf,
    /// This submission's directory under the memory controller.
    memory_path: PathBuf,
    /// Set once `delete` has removed both controller directories.
    deleted: bool,
}

impl CgroupHandle {
    /// Creates the cgroup directories for `submission_id` under `base`,
    /// applying `resources` to the CPU and memory controllers.
    ///
    /// # Errors
    /// Returns [`SpawnerError::Cgroup`] if either controller directory or
    /// control file cannot be created/written.
    pub fn create(base: &Path, submission_id: &str, resources: ResourceControl) -> Result<Self, SpawnerError> {
        let relative = sanitize_submission_id(submission_id);
        let cpu_path = base.join(CPU_CONTROLLER).join(&relative);
        let memory_path = base.join(MEMORY_CONTROLLER).join(&relative);

        std::fs::create_dir_all(&cpu_path).map_err(|err| SpawnerError::Cgroup(format!("creating cpu cgroup: {err}")))?;
        std::fs::create_dir_all(&memory_path).map_err(|err| SpawnerError::Cgroup(format!("creating memory cgroup: {err}")))?;

        let quota = CGROUP_CFS_PERIOD_US.saturating_mul(resources.cpu) / 100;
        write_control(&cpu_path, "cpu.cfs_period_us", CGROUP_CFS_PERIOD_US)?;
        write_control(&cpu_path, "cpu.cfs_quota_us", quota)?;

        let memory_limit = resources.memory.saturating_mul(1024 * 1024);
        write_control(&memory_path, "memory.limit_in_bytes", memory_limit)?;

        Ok(Self { cpu_path, memory_path, deleted: false })
    }

    /// Attaches `pid` to both controllers.
    ///
    /// # Errors
    /// Returns [`SpawnerError::Cgroup`] if either `cgroup.procs` write
    /// fails.
    pub fn add_proc(&self, pid: u32) -> Result<(), SpawnerError> {
        write_control(&self.cpu_path, "cgroup.procs", i64::from(pid))?;
        write_control(&self.memory_path, "cgroup.procs", i64::from(pid))?;
        Ok(())
    }

    /// Removes both controller directories. Idempotent: a handle already
    /// deleted is a no-op.
    ///
    /// # Errors
    /// Returns [`SpawnerError::Cgroup`] if either directory still has a
    /// live process attached (the kernel refuses the `rmdir`) or cannot be
    /// removed for another reason.
    pub fn delete(&mut self) -> Result<(), SpawnerError> {
        if self.deleted {
            return Ok(());
        }
        remove_if_present(&self.cpu_path)?;
        remove_if_present(&self.memory_path)?;
        self.deleted = true;
        Ok(())
    }
}

impl Drop for CgroupHandle {
    fn drop(&mut self) {
        let _ = self.delete();
    }
}

/// Writes `value` as decimal text into `cgroup_path/file`.
fn write_control(cgroup_path: &Path, file: &str, value: i64) -> Result<(), SpawnerError> {
    std::fs::write(cgroup_path.join(file), value.to_string()).map_err(|err| SpawnerError::Cgroup(format!("writing {file}: {err}")))
}

/// Removes `path`, treating an already-absent directory as success.
fn remove_if_present(path: &Path) -> Result<(), SpawnerError> {
    match std::fs::remove_dir(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SpawnerError::Cgroup(format!("deleting {}: {err}", path.display()))),
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_submission_id;

    #[test]
    fn passes_through_allowed_characters() {
        assert_eq!(sanitize_submission_id("abc-123_XYZ.9"), "abc-123_XYZ.9");
    }

    #[test]
    fn replaces_disallowed_bytes_with_dash() {
        assert_eq!(sanitize_submission_id("../etc/passwd"), "----etc-passwd");
        assert_eq!(sanitize_submission_id("a b/c"), "a-b-c");
    }
}
