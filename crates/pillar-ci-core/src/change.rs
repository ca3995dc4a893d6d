//! Change records produced by the tree differ.
//!
//! A record pairs a key path with a change kind. The flat rendering used by CI
//! callers is `segment1:segment2:...:segmentN;kind`.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Delimiter between path segments in the flat form.
pub const PATH_DELIMITER: char = ':';

/// Separator between the path and the change kind in the flat form.
pub const KIND_SEPARATOR: char = ';';

/// Ordered key segments from the tree root to a differing key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path with `key` appended.
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment; the node id for paths produced by the aggregator.
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{PATH_DELIMITER}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl<S: Into<String>> From<Vec<S>> for KeyPath {
    fn from(segments: Vec<S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }
}

/// Classification of a single-key difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Added, ChangeKind::Removed, ChangeKind::Modified];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = ChangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(ChangeKind::Added),
            "removed" => Ok(ChangeKind::Removed),
            "modified" => Ok(ChangeKind::Modified),
            other => Err(ChangeParseError::UnknownKind(other.to_string())),
        }
    }
}

/// Errors parsing the flat change form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangeParseError {
    #[error("missing ';' kind separator in change: {0}")]
    MissingKind(String),

    #[error("unknown change kind: {0}")]
    UnknownKind(String),

    #[error("change has an empty path: {0}")]
    EmptyPath(String),
}

/// One reported difference between two trees. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: KeyPath,
    pub kind: ChangeKind,
}

impl ChangeRecord {
    pub fn new(path: KeyPath, kind: ChangeKind) -> Self {
        Self { path, kind }
    }

    pub fn added(path: KeyPath) -> Self {
        Self::new(path, ChangeKind::Added)
    }

    pub fn removed(path: KeyPath) -> Self {
        Self::new(path, ChangeKind::Removed)
    }

    pub fn modified(path: KeyPath) -> Self {
        Self::new(path, ChangeKind::Modified)
    }

    /// Node id of the change (first path segment).
    pub fn node(&self) -> Option<&str> {
        self.path.first()
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KIND_SEPARATOR}{}", self.path, self.kind)
    }
}

impl FromStr for ChangeRecord {
    type Err = ChangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, kind) = s
            .rsplit_once(KIND_SEPARATOR)
            .ok_or_else(|| ChangeParseError::MissingKind(s.to_string()))?;
        let kind = kind.parse()?;
        if path.is_empty() {
            return Err(ChangeParseError::EmptyPath(s.to_string()));
        }
        let segments: Vec<&str> = path.split(PATH_DELIMITER).collect();
        Ok(Self::new(KeyPath::from(segments), kind))
    }
}

/// Render records in the flat `a:b;kind` form, preserving order.
pub fn flatten(changes: &[ChangeRecord]) -> Vec<String> {
    changes.iter().map(ToString::to_string).collect()
}

/// Counts of changes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub total: usize,
}

impl ChangeSummary {
    pub fn from_changes(changes: &[ChangeRecord]) -> Self {
        changes.iter().fold(Self::default(), |mut acc, change| {
            match change.kind {
                ChangeKind::Added => acc.added += 1,
                ChangeKind::Removed => acc.removed += 1,
                ChangeKind::Modified => acc.modified += 1,
            }
            acc.total += 1;
            acc
        })
    }

    pub fn is_clean(&self) -> bool {
        self.total == 0
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} change(s): {} added, {} removed, {} modified",
            self.total, self.added, self.removed, self.modified
        )
    }
}

/// Group changes by their node id, keeping first-seen node order and the
/// original order within each node.
pub fn group_by_node(changes: &[ChangeRecord]) -> IndexMap<String, Vec<&ChangeRecord>> {
    let mut groups: IndexMap<String, Vec<&ChangeRecord>> = IndexMap::new();
    for change in changes {
        let node = change.node().unwrap_or_default().to_string();
        groups.entry(node).or_default().push(change);
    }
    groups
}
