//! Per-environment snapshots of rendered pillar.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::tree::ConfigTree;

/// Rendered pillar for a set of nodes in one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub environment: String,
    pub nodes: IndexMap<String, ConfigTree>,
}

impl EnvironmentSnapshot {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            nodes: IndexMap::new(),
        }
    }

    /// Build from `(node id, tree)` pairs, keeping their order.
    pub fn from_nodes<I>(environment: impl Into<String>, nodes: I) -> Self
    where
        I: IntoIterator<Item = (String, ConfigTree)>,
    {
        Self {
            environment: environment.into(),
            nodes: nodes.into_iter().collect(),
        }
    }

    /// Load a `{ "<node id>": { ... } }` JSON document.
    pub fn from_json_str(environment: impl Into<String>, raw: &str) -> serde_json::Result<Self> {
        let nodes: IndexMap<String, ConfigTree> = serde_json::from_str(raw)?;
        Ok(Self {
            environment: environment.into(),
            nodes,
        })
    }

    /// Load a snapshot file; the environment is named after the file stem.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let environment = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_json_str(environment, &raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn insert(&mut self, node: impl Into<String>, tree: ConfigTree) {
        self.nodes.insert(node.into(), tree);
    }

    pub fn get(&self, node: &str) -> Option<&ConfigTree> {
        self.nodes.get(node)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The snapshot as a root mapping keyed by node id.
    pub fn as_tree(&self) -> ConfigTree {
        ConfigTree::Internal(self.nodes.clone())
    }

    /// SHA-256 hex digest of the snapshot's canonical JSON.
    ///
    /// Nodes and mapping keys are hashed in sorted order, so snapshots that
    /// compare equal digest equal regardless of render order.
    pub fn digest(&self) -> String {
        let mut nodes: Vec<(&String, &ConfigTree)> = self.nodes.iter().collect();
        nodes.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = Sha256::new();
        for (node, tree) in nodes {
            hasher.update(node.as_bytes());
            hasher.update(b"\0");
            hasher.update(tree.to_canonical_value().to_string().as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }

    /// Nodes present in only one of the two snapshots.
    pub fn node_delta(&self, incoming: &EnvironmentSnapshot) -> NodeDelta {
        let added = incoming
            .node_ids()
            .filter(|node| !self.nodes.contains_key(*node))
            .map(str::to_string)
            .collect();
        let removed = self
            .node_ids()
            .filter(|node| !incoming.nodes.contains_key(*node))
            .map(str::to_string)
            .collect();
        NodeDelta { added, removed }
    }
}

/// Whole-node additions and removals between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl NodeDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
