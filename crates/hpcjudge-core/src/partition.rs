// crates/hpcjudge-core/src/partition.rs
// ============================================================================
// Module: HPC Judge Partition Paths
// Description: Structural enforcement of path confinement for every
// partition-qualified path argument the bridge accepts.
// Purpose: Resolve a (partition, relative-path) pair to a filesystem
// location that is guaranteed, by construction, to stay inside the
// partition root.
// Dependencies: cap-std, cap-primitives
// ============================================================================

//! ## Overview
//! A partition is a logical name (`home`, `solution`, `problem`, `status`)
//! mapped to a filesystem root by bridge configuration. Every caller-supplied
//! path is resolved relative to its partition root by walking one path
//! component at a time through [`cap_std::fs::Dir`] handles opened with
//! `FollowSymlinks::No`, so neither a literal `..` component nor a symlink
//! planted inside the partition can walk the resolved path outside its
//! root (P3). This is the same anchor/component-walk shape used elsewhere
//! in this workspace for confined output directories, generalised here to
//! resolve a leaf file rather than create a directory tree.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use cap_primitives::fs::FollowSymlinks;
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use cap_std::fs::OpenOptions;

use crate::error::CoreError;

// ============================================================================
// SECTION: Partition Path
// ============================================================================

/// A (partition name, relative path) pair as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PartitionPath {
    /// Logical partition name, e.g. `solution`.
    pub partition: String,
    /// Path relative to the partition root.
    pub relative: PathBuf,
}

impl PartitionPath {
    /// Builds a partition path from its two components.
    #[must_use]
    pub fn new(partition: impl Into<String>, relative: impl Into<PathBuf>) -> Self {
        Self {
            partition: partition.into(),
            relative: relative.into(),
        }
    }
}

// ============================================================================
// SECTION: Partition Table
// ============================================================================

/// Maps logical partition names to absolute filesystem roots.
#[derive(Debug, Clone)]
pub struct PartitionTable {
    roots: BTreeMap<String, PathBuf>,
}

impl PartitionTable {
    /// Builds a partition table from a name-to-root mapping.
    #[must_use]
    pub fn new(roots: BTreeMap<String, PathBuf>) -> Self {
        Self { roots }
    }

    /// Returns the configured root for `partition`.
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownPartition`] if `partition` is not configured.
    pub fn root(&self, partition: &str) -> Result<&Path, CoreError> {
        self.roots
            .get(partition)
            .map(PathBuf::as_path)
            .ok_or_else(|| CoreError::UnknownPartition(partition.to_string()))
    }

    /// Resolves `path` to an informational absolute path string, rejecting
    /// any traversal component. Intended for read-only debug tooling
    /// (`calculate-path`) — it validates the component shape but does not
    /// re-check live symlinks the way [`Self::open_parent`] does, so
    /// mutating operations MUST go through [`Self::open_parent`] instead.
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownPartition`] or
    /// [`CoreError::PathOverflowsPartition`].
    pub fn resolve_absolute(&self, path: &PartitionPath) -> Result<PathBuf, CoreError> {
        let root = self.root(&path.partition)?;
        let components = relative_components(&path.relative)?;
        let mut resolved = root.to_path_buf();
        for component in &components {
            resolved.push(component);
        }
        Ok(resolved)
    }

    /// Maps an absolute filesystem path onto its partition by longest-root-
    /// prefix match, for CLIs that receive bare filesystem paths rather
    /// than pre-split `(partition, relative)` pairs (§4.6). A path resident
    /// under more than one configured root (one nested inside another)
    /// resolves to the most specific (longest) one.
    ///
    /// # Errors
    /// Returns [`CoreError::PathOverflowsPartition`] if `absolute` is not
    /// resident under any configured partition root.
    pub fn classify(&self, absolute: &Path) -> Result<PartitionPath, CoreError> {
        let mut best: Option<(&str, &Path, &Path)> = None;
        for (name, root) in &self.roots {
            if let Ok(relative) = absolute.strip_prefix(root) {
                let is_longer = best.is_none_or(|(_, current_root, _)| root.components().count() > current_root.components().count());
                if is_longer {
                    best = Some((name, root, relative));
                }
            }
        }
        let (partition, _root, relative) = best.ok_or(CoreError::PathOverflowsPartition)?;
        Ok(PartitionPath::new(partition, relative))
    }

    /// Walks every directory component of `path` but the last through
    /// capability-scoped handles opened without symlink-following,
    /// returning the validated parent [`Dir`] and the final path component.
    /// Callers perform the actual file operation (open/create/remove)
    /// through the returned `Dir`, which makes the final component safe
    /// even if it does not yet exist or is itself a dangling symlink.
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownPartition`],
    /// [`CoreError::InvalidRelativePath`], [`CoreError::PathOverflowsPartition`],
    /// or [`CoreError::Io`].
    pub fn open_parent(
        &self,
        path: &PartitionPath,
        create_missing: bool,
    ) -> Result<(Dir, OsString), CoreError> {
        let root = self.root(&path.partition)?;
        let components = relative_components(&path.relative)?;
        let Some((leaf, parents)) = components.split_last() else {
            return Err(CoreError::InvalidRelativePath(path.relative.clone()));
        };
        let mut current =
            Dir::open_ambient_dir(root, ambient_authority()).map_err(|err| CoreError::Io(err.to_string()))?;
        for component in parents {
            current = open_or_create_child_dir_nofollow(&current, component, create_missing)
                .map_err(|_| CoreError::PathOverflowsPartition)?;
        }
        Ok((current, leaf.clone()))
    }
}

// ============================================================================
// SECTION: Component Validation
// ============================================================================

/// Splits a caller-supplied relative path into plain path components,
/// rejecting anything that is not a simple descendant: parent-directory
/// components, absolute prefixes, and root markers are all traversal
/// attempts against a partition root and MUST be rejected outright.
fn relative_components(relative: &Path) -> Result<Vec<OsString>, CoreError> {
    let mut components = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(value) => components.push(value.to_os_string()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CoreError::PathOverflowsPartition);
            }
        }
    }
    if components.is_empty() {
        return Err(CoreError::InvalidRelativePath(relative.to_path_buf()));
    }
    Ok(components)
}

/// Opens a single child directory component without following symlinks.
fn open_child_dir_nofollow(parent: &Dir, child: &OsString) -> std::io::Result<Dir> {
    let mut options = OpenOptions::new();
    options.read(true);
    options._cap_fs_ext_follow(FollowSymlinks::No);
    let file = parent.open_with(Path::new(child), &options)?;
    let metadata = file.metadata()?;
    if !metadata.is_dir() {
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            "partition path component is not a directory",
        ));
    }
    Ok(Dir::from_std_file(file.into_std()))
}

/// Opens a child directory, creating it first if missing and permitted.
fn open_or_create_child_dir_nofollow(
    parent: &Dir,
    child: &OsString,
    create_missing: bool,
) -> std::io::Result<Dir> {
    match open_child_dir_nofollow(parent, child) {
        Ok(dir) => Ok(dir),
        Err(err) if err.kind() == ErrorKind::NotFound && create_missing => {
            parent.create_dir(Path::new(child))?;
            open_child_dir_nofollow(parent, child)
        }
        Err(err) => Err(err),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests use expect on deterministic fixtures.")]

    use super::*;

    fn table(root: &Path) -> PartitionTable {
        let mut roots = BTreeMap::new();
        roots.insert("solution".to_string(), root.to_path_buf());
        PartitionTable::new(roots)
    }

    #[test]
    fn resolves_nested_path_inside_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let table = table(dir.path());
        let path = PartitionPath::new("solution", "abc/solution.dat");
        let resolved = table.resolve_absolute(&path).expect("resolve");
        assert_eq!(resolved, dir.path().join("abc").join("solution.dat"));
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let table = table(dir.path());
        let path = PartitionPath::new("solution", "../../etc/passwd");
        let err = table.resolve_absolute(&path).expect_err("must reject");
        assert!(matches!(err, CoreError::PathOverflowsPartition));
    }

    #[test]
    fn rejects_unknown_partition() {
        let dir = tempfile::tempdir().expect("tempdir");
        let table = table(dir.path());
        let path = PartitionPath::new("problem", "x");
        let err = table.resolve_absolute(&path).expect_err("must reject");
        assert!(matches!(err, CoreError::UnknownPartition(_)));
    }

    #[test]
    fn open_parent_creates_missing_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let table = table(dir.path());
        let path = PartitionPath::new("solution", "abc/nested/solution.dat");
        let (parent, leaf) = table.open_parent(&path, true).expect("open_parent");
        assert_eq!(leaf, OsString::from("solution.dat"));
        parent.write("solution.dat", b"ok").expect("write through capability");
        assert!(dir.path().join("abc").join("nested").join("solution.dat").exists());
    }

    #[test]
    fn classify_picks_longest_matching_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut roots = BTreeMap::new();
        roots.insert("home".to_string(), dir.path().to_path_buf());
        roots.insert("solution".to_string(), dir.path().join("solution"));
        let table = PartitionTable::new(roots);

        let classified = table.classify(&dir.path().join("solution").join("s1").join("data")).expect("classify");
        assert_eq!(classified.partition, "solution");
        assert_eq!(classified.relative, Path::new("s1/data"));

        let classified = table.classify(&dir.path().join("alice").join(".bashrc")).expect("classify");
        assert_eq!(classified.partition, "home");
    }

    #[test]
    fn classify_rejects_path_outside_every_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("outside tempdir");
        let table = table(dir.path());
        let err = table.classify(outside.path()).expect_err("must reject");
        assert!(matches!(err, CoreError::PathOverflowsPartition));
    }

    #[test]
    fn open_parent_rejects_symlink_escape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("outside tempdir");
        #[cfg(unix)]
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).expect("symlink");
        let table = table(dir.path());
        let path = PartitionPath::new("solution", "escape/payload");
        let result = table.open_parent(&path, false);
        assert!(result.is_err());
    }

    proptest::proptest! {
        /// P3: any relative path made only of plain segments resolves under
        /// the partition root; a leading run of `../` segments of any depth
        /// is always rejected rather than ever escaping the root.
        #[test]
        fn resolve_absolute_never_escapes_root(
            segments in proptest::collection::vec("[a-zA-Z0-9_]{1,8}", 1..6),
            traversal_depth in 0usize..4,
        ) {
            let dir = tempfile::tempdir().expect("tempdir");
            let table = table(dir.path());

            let plain: PathBuf = segments.iter().collect();
            let resolved = table.resolve_absolute(&PartitionPath::new("solution", plain)).expect("plain path resolves");
            proptest::prop_assert!(resolved.starts_with(dir.path()));

            if traversal_depth > 0 {
                let mut traversal = PathBuf::new();
                for _ in 0..traversal_depth {
                    traversal.push("..");
                }
                for segment in &segments {
                    traversal.push(segment);
                }
                let err = table.resolve_absolute(&PartitionPath::new("solution", traversal)).expect_err("traversal must be rejected");
                proptest::prop_assert!(matches!(err, CoreError::PathOverflowsPartition));
            }
        }
    }
}
