// crates/hpcjudge-bridge/tests/partition_rejection.rs
// ============================================================================
// Integration test: every bridge operation rejects a partition-qualified
// path that would escape its configured root, and touches no filesystem
// state while doing so. Grounded on spec scenario 6 (§8) and invariant P3.
// ============================================================================

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests use expect on deterministic fixtures.")]

use std::collections::BTreeMap;

use hpcjudge_bridge::error::BridgeError;
use hpcjudge_bridge::operations::Bridge;
use hpcjudge_core::PartitionPath;
use hpcjudge_core::PartitionTable;

fn bridge_over(root: &std::path::Path) -> Bridge {
    let mut roots = BTreeMap::new();
    roots.insert("solution".to_string(), root.to_path_buf());
    Bridge::new(PartitionTable::new(roots))
}

#[tokio::test]
async fn fetch_object_rejects_traversal_without_touching_the_filesystem() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bridge = bridge_over(dir.path());

    let request = hpcjudge_bridge::protocol::FetchObjectRequest {
        source_url: "http://unreachable.invalid/never-fetched".to_string(),
        destination: PartitionPath::new("solution", "../../etc/passwd"),
        owner: None,
        mode: None,
    };

    let err = bridge.fetch_object(&request).await.expect_err("must reject traversal");
    assert!(matches!(err, BridgeError::PathOverflowsPartition));

    // Nothing should have been created under the partition root.
    let mut entries = std::fs::read_dir(dir.path()).expect("read_dir");
    assert!(entries.next().is_none());
}

#[test]
fn calculate_path_rejects_traversal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bridge = bridge_over(dir.path());

    let request = hpcjudge_bridge::protocol::CalculatePathRequest { path: PartitionPath::new("solution", "../outside") };
    let err = bridge.calculate_path(&request).expect_err("must reject traversal");
    assert!(matches!(err, BridgeError::PathOverflowsPartition));
}

#[test]
fn calculate_path_rejects_unknown_partition() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bridge = bridge_over(dir.path());

    let request = hpcjudge_bridge::protocol::CalculatePathRequest { path: PartitionPath::new("problem", "x") };
    let err = bridge.calculate_path(&request).expect_err("must reject unknown partition");
    assert!(matches!(err, BridgeError::UnknownPartition(name) if name == "problem"));
}

#[tokio::test]
async fn remove_file_rejects_traversal_without_touching_the_filesystem() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("sibling-marker"), b"present").expect("seed sibling file");
    let outside = tempfile::tempdir().expect("outside tempdir");
    std::fs::write(outside.path().join("passwd"), b"root:x:0:0").expect("seed outside file");

    let bridge = bridge_over(dir.path());
    let request = hpcjudge_bridge::protocol::RemoveFileRequest {
        path: PartitionPath::new("solution", "../does-not-matter"),
    };
    let err = bridge.remove_file(&request).await.expect_err("must reject traversal");
    assert!(matches!(err, BridgeError::PathOverflowsPartition));
    assert!(outside.path().join("passwd").exists(), "file outside the partition root must survive untouched");
}

#[test]
fn calculate_path_resolves_a_legitimate_nested_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bridge = bridge_over(dir.path());

    let request = hpcjudge_bridge::protocol::CalculatePathRequest { path: PartitionPath::new("solution", "s-1/solution.dat") };
    let response = bridge.calculate_path(&request).expect("resolves");
    assert_eq!(response.absolute_path, dir.path().join("s-1").join("solution.dat").display().to_string());
}
