// crates/hpcjudge-spawner/src/spawner.rs
// ============================================================================
// Module: HPC Judge Spawner
// Description: The run-judge-script orchestration: problem-data staging,
// entrance resolution, status-file lifecycle, cgroup-isolated spawn, and
// cleanup on every exit path.
// Purpose: Mirror the Go `Spawner`/`Command.RunJudgeScript` pair in one
// type that owns the configured cgroup base path and storage partitions.
// Dependencies: hpcjudge-core, hpcjudge-config, std::process
// ============================================================================

//! ## Overview
//! Credential switching uses `std::os::unix::process::CommandExt::{uid,gid}`
//! on a plain `std::process::Command`, the idiomatic equivalent of Go's
//! `SysProcAttr.Credential`. cgroup attachment happens after `spawn()`
//! returns, against the real pid, matching the Go `cg.AddProc(pid)`
//! ordering — there is no need for an `unsafe` `pre_exec` hook anywhere in
//! this crate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::os::unix::process::CommandExt as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use hpcjudge_config::SpawnerConfig;
use hpcjudge_core::constants::SOLUTION_DIR_MODE;
use hpcjudge_core::constants::STAGED_PROBLEM_DIR_MODE;
use hpcjudge_core::unixuser;
use hpcjudge_core::Entrance;

use crate::cgroup::CgroupHandle;
use crate::error::SpawnerError;
use crate::protocol::RunJudgeScriptData;
use crate::status;
use crate::template::Replacer;

/// File name the rendered judge script is written to under the solution
/// directory.
const JUDGE_SCRIPT_FILE: &str = "judge-script.sh";
/// Auto-remove-solution cleanup is skipped for this user (§4.4 invariant).
const ROOT_USERNAME: &str = "root";

// ============================================================================
// SECTION: Spawner
// ============================================================================

/// Runs judge scripts inside a cgroup-isolated, unprivileged user context.
pub struct Spawner {
    /// Cgroup base path and partition table this spawner was configured
    /// with.
    config: SpawnerConfig,
}

impl Spawner {
    /// Builds a spawner bound to `config`.
    #[must_use]
    pub fn new(config: SpawnerConfig) -> Self {
        Self { config }
    }

    /// Runs the full `run-judge-script` flow for `data`.
    ///
    /// # Errors
    /// Returns [`SpawnerError`] if staging, user resolution, cgroup setup,
    /// or spawning the entrance fails. A non-zero/non-crash exit of the
    /// entrance itself is not an error: the caller inspects the returned
    /// exit status.
    pub fn run_judge_script(&self, data: &RunJudgeScriptData) -> Result<std::process::ExitStatus, SpawnerError> {
        let result = self.run_judge_script_inner(data);
        if data.auto_remove_solution {
            self.auto_remove_solution(&data.solution_id.to_string(), &data.username);
        }
        result
    }

    /// Stages problem data, writes the status file, spawns the cgroup-
    /// isolated entrance, and cleans up the status file and cgroup on
    /// every return path.
    fn run_judge_script_inner(&self, data: &RunJudgeScriptData) -> Result<std::process::ExitStatus, SpawnerError> {
        let problem_root = self.partition_root("problem")?;
        let solution_root = self.partition_root("solution")?;
        let status_root = self.partition_root("status")?;

        let user = unixuser::resolve_user(&data.username)?;

        let staged_problem_dir = user.home.join("problem").join(&data.problem_id);
        stage_problem_data(&problem_root.join(&data.problem_id), &staged_problem_dir)?;
        unixuser::chown(&staged_problem_dir, user.uid, user.gid)?;
        chmod_recursive(&staged_problem_dir, STAGED_PROBLEM_DIR_MODE)?;

        let solution_dir = solution_root.join(data.solution_id.to_string());
        chmod_recursive(&solution_dir, SOLUTION_DIR_MODE)?;

        let mut command = self.build_entrance(data, &problem_root, &solution_root, &solution_dir)?;

        status::write_status(&status_root, &data.username, &data.problem_id, data.solution_id, -1, &staged_problem_dir)?;
        let status_cleanup = || {
            let _ = status::clear_status(&status_root, &data.username);
        };

        let (mut child, mut cgroup_handle) = match self.spawn_in_cgroup(&mut command, &data.solution_id.to_string(), data.resource_control) {
            Ok(spawned) => spawned,
            Err(err) => {
                status_cleanup();
                return Err(err);
            }
        };

        status::write_status(&status_root, &data.username, &data.problem_id, data.solution_id, i64::from(child.id()), &staged_problem_dir)?;

        let outcome = child.wait().map_err(|err| SpawnerError::SpawnFailed(err.to_string()));
        status_cleanup();
        let _ = cgroup_handle.delete();
        outcome
    }

    /// Spawns `command` as its designated user, attaching the resulting
    /// pid to a fresh cgroup. On any attach failure, kills the process and
    /// deletes the cgroup before returning the error (P6).
    fn spawn_in_cgroup(
        &self,
        command: &mut Command,
        submission_id: &str,
        resources: hpcjudge_core::ResourceControl,
    ) -> Result<(std::process::Child, CgroupHandle), SpawnerError> {
        let cgroup_base = PathBuf::from(&self.config.cgroups_base_path);
        let mut cgroup = CgroupHandle::create(&cgroup_base, submission_id, resources)?;

        let mut child = command.spawn().map_err(|err| {
            let _ = cgroup.delete();
            SpawnerError::SpawnFailed(err.to_string())
        })?;

        if let Err(err) = cgroup.add_proc(child.id()) {
            let _ = child.kill();
            let _ = child.wait();
            let _ = cgroup.delete();
            return Err(err);
        }

        Ok((child, cgroup))
    }

    /// Builds the entrance command, resolving an inline command or a
    /// templated script file, and switches its credentials per
    /// `CommandUseUser`.
    fn build_entrance(
        &self,
        data: &RunJudgeScriptData,
        problem_root: &Path,
        solution_root: &Path,
        solution_dir: &Path,
    ) -> Result<Command, SpawnerError> {
        let user = unixuser::resolve_user(&data.username)?;
        unixuser::ensure_home_dir(&user.home, user.uid, user.gid)?;

        let mut command = match &data.entrance {
            Entrance::Command(inline) => {
                let mut command = Command::new("bash");
                command.arg("-c").arg(inline);
                command
            }
            Entrance::Script(script_relative) => {
                let script_source = problem_root.join(&data.problem_id).join(script_relative);
                let script_body = std::fs::read_to_string(&script_source).map_err(|err| SpawnerError::Io(err.to_string()))?;
                let replacer = Replacer::new(&data.solution_id.to_string(), &data.problem_id, &data.username, problem_root, solution_root);
                let rendered = replacer.replace(&script_body);
                let script_path = solution_dir.join(JUDGE_SCRIPT_FILE);
                std::fs::write(&script_path, rendered).map_err(|err| SpawnerError::Io(err.to_string()))?;
                std::fs::set_permissions(&script_path, std::os::unix::fs::PermissionsExt::from_mode(hpcjudge_core::constants::JUDGE_SCRIPT_MODE))
                    .map_err(|err| SpawnerError::Io(err.to_string()))?;
                unixuser::chown(&script_path, user.uid, user.gid)?;
                Command::new(script_path)
            }
        };

        let mut env = unixuser::base_environment(&data.username, &user.home);
        env.push(("PATH".to_string(), std::env::var("PATH").unwrap_or_default()));
        command
            .current_dir(&user.home)
            .env_clear()
            .envs(env)
            .uid(user.uid)
            .gid(user.gid)
            .stdin(Stdio::null());
        Ok(command)
    }

    /// Resolves the configured filesystem root for partition `name`.
    fn partition_root(&self, name: &str) -> Result<PathBuf, SpawnerError> {
        self.config
            .storage_path
            .get(name)
            .map(PathBuf::from)
            .ok_or_else(|| SpawnerError::Io(format!("unconfigured partition: {name}")))
    }

    /// `rm -rf`s the solution directory and wipes the user's home
    /// (excluding `.`/`..`), skipping entirely if the target user is
    /// `root`. Best-effort: logged by the caller, never fatal to the
    /// overall run.
    fn auto_remove_solution(&self, solution_id: &str, username: &str) {
        if username == ROOT_USERNAME {
            return;
        }
        if let Ok(solution_root) = self.partition_root("solution") {
            let _ = std::fs::remove_dir_all(solution_root.join(solution_id));
        }
        if let Ok(user) = unixuser::resolve_user(username) {
            let _ = wipe_directory_contents(&user.home);
        }
    }
}

// ============================================================================
// SECTION: Filesystem Helpers
// ============================================================================

/// Copies `source` onto `destination`, preserving the directory structure,
/// creating `destination`'s parent as needed. Used to isolate problem data
/// per submission (step 2 of the run-judge-script flow).
fn stage_problem_data(source: &Path, destination: &Path) -> Result<(), SpawnerError> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|err| SpawnerError::Io(err.to_string()))?;
    }
    copy_recursive(source, destination)
}

/// Recursively copies `source` onto `destination`, creating directories as
/// needed.
fn copy_recursive(source: &Path, destination: &Path) -> Result<(), SpawnerError> {
    let metadata = std::fs::symlink_metadata(source).map_err(|err| SpawnerError::Io(err.to_string()))?;
    if metadata.is_dir() {
        std::fs::create_dir_all(destination).map_err(|err| SpawnerError::Io(err.to_string()))?;
        for entry in std::fs::read_dir(source).map_err(|err| SpawnerError::Io(err.to_string()))? {
            let entry = entry.map_err(|err| SpawnerError::Io(err.to_string()))?;
            copy_recursive(&entry.path(), &destination.join(entry.file_name()))?;
        }
    } else {
        std::fs::copy(source, destination).map_err(|err| SpawnerError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Recursively chmods `path` (and, if it is a directory, every entry
/// beneath it) to `mode`.
fn chmod_recursive(path: &Path, mode: u32) -> Result<(), SpawnerError> {
    let metadata = std::fs::symlink_metadata(path).map_err(|err| SpawnerError::Io(err.to_string()))?;
    std::fs::set_permissions(path, std::os::unix::fs::PermissionsExt::from_mode(mode)).map_err(|err| SpawnerError::Io(err.to_string()))?;
    if metadata.is_dir() {
        for entry in std::fs::read_dir(path).map_err(|err| SpawnerError::Io(err.to_string()))? {
            let entry = entry.map_err(|err| SpawnerError::Io(err.to_string()))?;
            chmod_recursive(&entry.path(), mode)?;
        }
    }
    Ok(())
}

/// Removes every entry directly under `dir`, leaving `dir` itself in
/// place (mirrors "wipe the home directory excluding `.` and `..`").
fn wipe_directory_contents(dir: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            std::fs::remove_dir_all(path)?;
        } else {
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}
