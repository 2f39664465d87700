// crates/hpcjudge-spawner/src/template.rs
// ============================================================================
// Module: HPC Judge Script Template Substitution
// Description: Literal string replacement of the five entrance-script
// tokens, matching the Go `strings.Replacer` used by `utilitycmd/replacer`.
// Purpose: Expand `${solution_id}`, `${problem_id}`, `${solution_path}`,
// `${problem_path}`, `${system_user}` before a templated judge script runs.
// Dependencies: none
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use hpcjudge_core::constants::SOLUTION_FILE_NAME;

/// Expands the five entrance-script tokens against one submission's
/// context.
pub struct Replacer {
    /// Value substituted for `${solution_id}`.
    solution_id: String,
    /// Value substituted for `${problem_id}`.
    problem_id: String,
    /// Value substituted for `${system_user}`.
    system_user: String,
    /// Value substituted for `${solution_path}`.
    solution_path: PathBuf,
    /// Value substituted for `${problem_path}`.
    problem_path: PathBuf,
}

impl Replacer {
    /// Builds a replacer for `solution_id`/`problem_id`/`system_user`,
    /// given the staged problem directory root and the solution partition
    /// root (used to compute `${problem_path}` and `${solution_path}`).
    #[must_use]
    pub fn new(solution_id: &str, problem_id: &str, system_user: &str, problem_root: &Path, solution_root: &Path) -> Self {
        Self {
            solution_id: solution_id.to_string(),
            problem_id: problem_id.to_string(),
            system_user: system_user.to_string(),
            solution_path: solution_root.join(solution_id).join(SOLUTION_FILE_NAME),
            problem_path: problem_root.join(problem_id),
        }
    }

    /// Replaces every occurrence of the five tokens in `input`.
    #[must_use]
    pub fn replace(&self, input: &str) -> String {
        input
            .replace("${solution_id}", &self.solution_id)
            .replace("${problem_id}", &self.problem_id)
            .replace("${solution_path}", &self.solution_path.display().to_string())
            .replace("${problem_path}", &self.problem_path.display().to_string())
            .replace("${system_user}", &self.system_user)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::Replacer;

    #[test]
    fn expands_all_five_tokens() {
        let replacer = Replacer::new("sol-1", "prob-1", "judge-sol-1", Path::new("/srv/problem"), Path::new("/srv/solution"));
        let rendered = replacer.replace("run ${system_user} on ${problem_id}/${solution_id}: ${problem_path} ${solution_path}");
        assert_eq!(rendered, "run judge-sol-1 on prob-1/sol-1: /srv/problem/prob-1 /srv/solution/sol-1/solution.dat");
    }
}
