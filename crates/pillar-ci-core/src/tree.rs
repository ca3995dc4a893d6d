//! Rendered pillar trees.
//!
//! A [`ConfigTree`] is either a leaf holding an opaque JSON value (scalars,
//! sequences, null) or an internal mapping from key to subtree. Every JSON
//! object becomes a mapping, so the internal-versus-leaf question is always a
//! `match` rather than a runtime type probe.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mapping of key to subtree. Keys keep the order the renderer produced them in.
pub type Mapping = IndexMap<String, ConfigTree>;

/// Shape of a tree node, used when reporting structural mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Leaf,
    Internal,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Leaf => f.write_str("leaf"),
            NodeKind::Internal => f.write_str("mapping"),
        }
    }
}

/// A resolved, per-node nested configuration structure.
///
/// Equality is structural: mappings compare without regard to key order and
/// leaves compare deeply, with integral floats equal to integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigTree {
    Internal(Mapping),
    Leaf(Value),
}

impl ConfigTree {
    /// An empty mapping.
    pub fn empty() -> Self {
        ConfigTree::Internal(Mapping::new())
    }

    pub fn leaf(value: impl Into<Value>) -> Self {
        ConfigTree::Leaf(value.into())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            ConfigTree::Leaf(_) => NodeKind::Leaf,
            ConfigTree::Internal(_) => NodeKind::Internal,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ConfigTree::Internal(_))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            ConfigTree::Internal(map) => Some(map),
            ConfigTree::Leaf(_) => None,
        }
    }

    /// Child at `key`. Always `None` for leaves.
    pub fn get(&self, key: &str) -> Option<&ConfigTree> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Resolve a path of keys below this node.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&ConfigTree> {
        path.iter().try_fold(self, |node, key| node.get(key.as_ref()))
    }

    /// Keys of a mapping in enumeration order; empty for leaves.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.as_mapping()
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }

    /// Number of direct children (zero for leaves).
    pub fn len(&self) -> usize {
        self.as_mapping().map_or(0, |map| map.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert back into a plain JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            ConfigTree::Leaf(value) => value.clone(),
            ConfigTree::Internal(map) => Value::Object(
                map.iter()
                    .map(|(key, child)| (key.clone(), child.to_value()))
                    .collect(),
            ),
        }
    }
}

/// Canonical form of a JSON value: object keys sorted at every depth and
/// integral floats written as integers, so `80` and `80.0` agree.
pub fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|key| (key.clone(), canonical_value(&map[key.as_str()])))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        Value::Number(n) => match n.as_f64() {
            Some(f)
                if n.is_f64()
                    && f.is_finite()
                    && f.fract() == 0.0
                    && f >= i64::MIN as f64
                    && f < i64::MAX as f64 =>
            {
                Value::from(f as i64)
            }
            _ => value.clone(),
        },
        other => other.clone(),
    }
}

/// Leaf comparison used by the differ: equal after [`canonical_value`].
pub fn leaf_values_equal(a: &Value, b: &Value) -> bool {
    a == b || canonical_value(a) == canonical_value(b)
}

impl ConfigTree {
    /// [`ConfigTree::to_value`] in canonical form, for digests.
    pub fn to_canonical_value(&self) -> Value {
        match self {
            ConfigTree::Leaf(value) => canonical_value(value),
            ConfigTree::Internal(map) => {
                let mut entries: Vec<(&String, &ConfigTree)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                Value::Object(
                    entries
                        .into_iter()
                        .map(|(key, child)| (key.clone(), child.to_canonical_value()))
                        .collect(),
                )
            }
        }
    }
}

impl PartialEq for ConfigTree {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConfigTree::Internal(a), ConfigTree::Internal(b)) => a == b,
            (ConfigTree::Leaf(a), ConfigTree::Leaf(b)) => leaf_values_equal(a, b),
            _ => false,
        }
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for ConfigTree {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => ConfigTree::Internal(
                map.into_iter()
                    .map(|(key, child)| (key, ConfigTree::from(child)))
                    .collect(),
            ),
            other => ConfigTree::Leaf(other),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, ConfigTree)> for ConfigTree {
    fn from_iter<I: IntoIterator<Item = (K, ConfigTree)>>(iter: I) -> Self {
        ConfigTree::Internal(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_objects_become_mappings() {
        let tree = ConfigTree::from(json!({"a": {"b": 1}, "c": [1, {"d": 2}]}));
        assert_eq!(tree.kind(), NodeKind::Internal);
        assert_eq!(tree.get("a").map(ConfigTree::kind), Some(NodeKind::Internal));
        // sequences stay leaves even when they hold objects
        assert_eq!(
            tree.get("c"),
            Some(&ConfigTree::Leaf(json!([1, {"d": 2}])))
        );
    }

    #[test]
    fn test_deserialize_matches_from_value() {
        let raw = r#"{"users": {"alice": {"uid": 1000}}, "motd": "hi", "ports": [22, 80]}"#;
        let parsed: ConfigTree = serde_json::from_str(raw).unwrap();
        let converted = ConfigTree::from(serde_json::from_str::<Value>(raw).unwrap());
        assert_eq!(parsed, converted);
        assert_eq!(
            parsed.get_path(&["users", "alice", "uid"]),
            Some(&ConfigTree::leaf(1000))
        );
    }

    #[test]
    fn test_key_order_is_preserved() {
        let tree: ConfigTree = serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
        let keys: Vec<&str> = tree.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_equality_ignores_key_order() {
        let a = ConfigTree::from(json!({"x": 1, "y": {"p": true, "q": null}}));
        let b = ConfigTree::from(json!({"y": {"q": null, "p": true}, "x": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_serialize_round_trip_shape() {
        let value = json!({"a": {"b": [1, 2]}, "c": "x"});
        let tree = ConfigTree::from(value.clone());
        assert_eq!(serde_json::to_value(&tree).unwrap(), value);
        assert_eq!(tree.to_value(), value);
    }

    #[test]
    fn test_leaf_has_no_keys() {
        let leaf = ConfigTree::leaf("scalar");
        assert_eq!(leaf.keys().count(), 0);
        assert!(leaf.get("anything").is_none());
        assert!(leaf.is_empty());
    }

    #[test]
    fn test_canonical_value_sorts_keys_at_every_depth() {
        let a = ConfigTree::from(json!({"y": {"q": 1, "p": [{"b": 1, "a": 2}]}, "x": 1}));
        let b = ConfigTree::from(json!({"x": 1, "y": {"p": [{"a": 2, "b": 1}], "q": 1}}));
        assert_eq!(
            a.to_canonical_value().to_string(),
            b.to_canonical_value().to_string()
        );
        assert_eq!(
            a.to_canonical_value().to_string(),
            r#"{"x":1,"y":{"p":[{"a":2,"b":1}],"q":1}}"#
        );
    }

    #[test]
    fn test_integral_floats_equal_integers() {
        assert!(leaf_values_equal(&json!(80), &json!(80.0)));
        assert!(leaf_values_equal(&json!([1, 2.0]), &json!([1.0, 2])));
        assert!(!leaf_values_equal(&json!(80), &json!(80.5)));
        assert!(!leaf_values_equal(&json!(1), &json!(true)));
        assert!(!leaf_values_equal(&json!("80"), &json!(80)));
    }

    #[test]
    fn test_from_iterator_builds_mapping() {
        let tree: ConfigTree = vec![("n1", ConfigTree::leaf(1)), ("n2", ConfigTree::empty())]
            .into_iter()
            .collect();
        assert_eq!(tree.len(), 2);
        assert!(tree.get("n2").unwrap().is_internal());
    }
}
