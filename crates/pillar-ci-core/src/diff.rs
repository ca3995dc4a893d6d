//! Recursive key-driven diff between two pillar trees.
//!
//! Traversal is depth-first. For each mapping, keys of the target side are
//! visited first (removed, recursed into, or compared as leaves), then keys only
//! present on the incoming side are reported as added. Additions and removals
//! directly under the root path are suppressed: whole-node changes are reported
//! through [`crate::snapshot::NodeDelta`] instead of as a cascade of leaf records.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::change::{ChangeRecord, KeyPath};
use crate::error::DiffError;
use crate::tree::{leaf_values_equal, ConfigTree, Mapping};

/// What to do when a key is a mapping on one side and a leaf on the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Fail the diff with [`DiffError::StructuralMismatch`].
    #[default]
    Error,
    /// Report a single `modified` record at the mismatching path.
    Modified,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    pub mismatch: MismatchPolicy,
}

impl DiffOptions {
    pub fn with_mismatch(mut self, mismatch: MismatchPolicy) -> Self {
        self.mismatch = mismatch;
        self
    }
}

/// Pure comparator between two trees. Holds no state beyond its options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeDiffer {
    options: DiffOptions,
}

impl TreeDiffer {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> DiffOptions {
        self.options
    }

    /// Diff `incoming` against `target`, addressing records relative to `path`.
    pub fn diff(
        &self,
        target: &ConfigTree,
        incoming: &ConfigTree,
        path: &KeyPath,
    ) -> Result<Vec<ChangeRecord>, DiffError> {
        let mut changes = Vec::new();
        self.diff_node(target, incoming, path, &mut changes)?;
        Ok(changes)
    }

    /// Diff two mappings directly, e.g. two environment snapshots keyed by node id.
    pub fn diff_mappings(
        &self,
        target: &Mapping,
        incoming: &Mapping,
        path: &KeyPath,
    ) -> Result<Vec<ChangeRecord>, DiffError> {
        let mut changes = Vec::new();
        self.walk_mappings(target, incoming, path, &mut changes)?;
        Ok(changes)
    }

    fn diff_node(
        &self,
        target: &ConfigTree,
        incoming: &ConfigTree,
        path: &KeyPath,
        changes: &mut Vec<ChangeRecord>,
    ) -> Result<(), DiffError> {
        match (target, incoming) {
            (ConfigTree::Internal(target_map), ConfigTree::Internal(incoming_map)) => {
                self.walk_mappings(target_map, incoming_map, path, changes)
            }
            (ConfigTree::Leaf(a), ConfigTree::Leaf(b)) => {
                if !leaf_values_equal(a, b) {
                    trace!(path = %path, "leaf modified");
                    changes.push(ChangeRecord::modified(path.clone()));
                }
                Ok(())
            }
            _ => match self.options.mismatch {
                MismatchPolicy::Error => Err(DiffError::StructuralMismatch {
                    path: path.clone(),
                    target: target.kind(),
                    incoming: incoming.kind(),
                }),
                MismatchPolicy::Modified => {
                    trace!(path = %path, "structural mismatch reported as modified");
                    changes.push(ChangeRecord::modified(path.clone()));
                    Ok(())
                }
            },
        }
    }

    fn walk_mappings(
        &self,
        target: &Mapping,
        incoming: &Mapping,
        path: &KeyPath,
        changes: &mut Vec<ChangeRecord>,
    ) -> Result<(), DiffError> {
        let nested = !path.is_root();

        for (key, target_child) in target {
            match incoming.get(key) {
                Some(incoming_child) => {
                    self.diff_node(target_child, incoming_child, &path.child(key), changes)?;
                }
                None if nested => changes.push(ChangeRecord::removed(path.child(key))),
                None => trace!(key = %key, "root-level removal suppressed"),
            }
        }

        for key in incoming.keys() {
            if target.contains_key(key) {
                continue;
            }
            if nested {
                changes.push(ChangeRecord::added(path.child(key)));
            } else {
                trace!(key = %key, "root-level addition suppressed");
            }
        }

        Ok(())
    }
}

/// Diff two trees from the root with default options.
pub fn diff_trees(
    target: &ConfigTree,
    incoming: &ConfigTree,
) -> Result<Vec<ChangeRecord>, DiffError> {
    TreeDiffer::default().diff(target, incoming, &KeyPath::root())
}
