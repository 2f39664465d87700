// crates/hpcjudge-orchestrator/src/problem.rs
// ============================================================================
// Module: HPC Judge Problem Descriptor Loading
// Description: Fetches and parses `problem.toml` from the object store, and
// extracts it from a freshly uploaded `data.tar` archive for the intake
// watcher.
// Purpose: One place that knows the descriptor's object key and its TOML
// shape, shared by `ProcessJudge` (§4.5.A.4.b) and the problem-data intake
// watcher (§4.5.D).
// Dependencies: hpcjudge-core, tar, toml
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use hpcjudge_core::ProblemDescriptor;
use hpcjudge_core::constants::PROBLEM_DESCRIPTOR_FILE;

use crate::error::OrchestratorError;
use crate::objectstore::ObjectStore;

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Fetches and parses `problem/<problem_id>/problem.toml`.
///
/// # Errors
/// Returns [`OrchestratorError::ObjectStore`] if the object is missing, or
/// [`OrchestratorError::ProblemDescriptor`] if it does not parse as TOML.
pub async fn load_descriptor(store: &ObjectStore, problem_id: &str) -> Result<ProblemDescriptor, OrchestratorError> {
    let key = format!("{problem_id}/{PROBLEM_DESCRIPTOR_FILE}");
    let raw = store.get(store.problem_bucket(), &key).await?;
    let text = String::from_utf8(raw).map_err(|err| OrchestratorError::ProblemDescriptor(err.to_string()))?;
    toml::from_str(&text).map_err(|err| OrchestratorError::ProblemDescriptor(err.to_string()))
}

// ============================================================================
// SECTION: Intake Extraction
// ============================================================================

/// Streams `archive` as a tar and returns the raw bytes of its
/// `problem.toml` entry.
///
/// # Errors
/// Returns [`OrchestratorError::ProblemArchive`] if the archive cannot be
/// walked, or [`OrchestratorError::MissingProblemDescriptor`] if no entry
/// named `problem.toml` is present.
pub fn extract_descriptor_toml(archive: &[u8]) -> Result<Vec<u8>, OrchestratorError> {
    let mut reader = tar::Archive::new(archive);
    let entries = reader.entries().map_err(|err| OrchestratorError::ProblemArchive(err.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| OrchestratorError::ProblemArchive(err.to_string()))?;
        let path = entry.path().map_err(|err| OrchestratorError::ProblemArchive(err.to_string()))?;
        if path.file_name().is_some_and(|name| name == PROBLEM_DESCRIPTOR_FILE) {
            let mut contents = Vec::new();
            std::io::copy(&mut entry, &mut contents).map_err(|err| OrchestratorError::ProblemArchive(err.to_string()))?;
            return Ok(contents);
        }
    }
    Err(OrchestratorError::MissingProblemDescriptor(PROBLEM_DESCRIPTOR_FILE.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests use expect on deterministic fixtures.")]

    use super::*;

    fn build_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *contents).expect("append");
        }
        builder.into_inner().expect("finish tar")
    }

    #[test]
    fn extracts_problem_toml_from_archive() {
        let archive = build_tar(&[("data/ignored.bin", b"x"), ("problem.toml", b"id = \"p1\"")]);
        let extracted = extract_descriptor_toml(&archive).expect("extract");
        assert_eq!(extracted, b"id = \"p1\"");
    }

    #[test]
    fn rejects_archive_missing_descriptor() {
        let archive = build_tar(&[("data/ignored.bin", b"x")]);
        let err = extract_descriptor_toml(&archive).expect_err("must fail");
        assert!(matches!(err, OrchestratorError::MissingProblemDescriptor(_)));
    }
}
