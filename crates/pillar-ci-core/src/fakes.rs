//! In-memory renderer fake (testing only)
//!
//! [`MemoryRenderer`] serves pillar from a `(environment, node)` table, can be
//! told to fail or stall for specific pairs, and records every call so tests
//! can assert call counts and fail-fast behaviour.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RenderError;
use crate::renderer::{PillarRenderer, RenderResult};
use crate::tree::ConfigTree;

type Key = (String, String);

fn key(environment: &str, node: &str) -> Key {
    (environment.to_string(), node.to_string())
}

/// Renderer backed by an in-memory table.
#[derive(Debug, Default)]
pub struct MemoryRenderer {
    trees: HashMap<Key, ConfigTree>,
    failures: HashMap<Key, RenderError>,
    delays: HashMap<Key, Duration>,
    calls: Mutex<Vec<Key>>,
}

impl MemoryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `tree` for `node` in `environment`.
    pub fn with_tree(mut self, environment: &str, node: &str, tree: impl Into<ConfigTree>) -> Self {
        self.trees.insert(key(environment, node), tree.into());
        self
    }

    /// Fail renders of `node` in `environment` with `error`.
    pub fn with_failure(mut self, environment: &str, node: &str, error: RenderError) -> Self {
        self.failures.insert(key(environment, node), error);
        self
    }

    /// Sleep for `delay` before answering renders of `node` in `environment`.
    pub fn with_delay(mut self, environment: &str, node: &str, delay: Duration) -> Self {
        self.delays.insert(key(environment, node), delay);
        self
    }

    /// Every `(environment, node)` pair rendered so far, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PillarRenderer for MemoryRenderer {
    async fn render(&self, node: &str, environment: &str) -> RenderResult<ConfigTree> {
        let k = key(environment, node);
        self.calls.lock().unwrap().push(k.clone());

        if let Some(delay) = self.delays.get(&k) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(err) = self.failures.get(&k) {
            return Err(err.clone());
        }
        if !self.trees.keys().any(|(env, _)| env == environment) {
            return Err(RenderError::UnknownEnvironment {
                node: node.to_string(),
                environment: environment.to_string(),
            });
        }
        self.trees
            .get(&k)
            .cloned()
            .ok_or_else(|| RenderError::UnknownNode {
                node: node.to_string(),
                environment: environment.to_string(),
            })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_serves_configured_tree() {
        let renderer = MemoryRenderer::new().with_tree("base", "n1", json!({"x": 1}));
        let tree = renderer.render("n1", "base").await.unwrap();
        assert_eq!(tree, ConfigTree::from(json!({"x": 1})));
        assert_eq!(renderer.calls(), vec![("base".to_string(), "n1".to_string())]);
    }

    #[tokio::test]
    async fn test_unknown_node_and_environment() {
        let renderer = MemoryRenderer::new().with_tree("base", "n1", json!({}));
        assert!(matches!(
            renderer.render("n2", "base").await,
            Err(RenderError::UnknownNode { .. })
        ));
        assert!(matches!(
            renderer.render("n1", "nope").await,
            Err(RenderError::UnknownEnvironment { .. })
        ));
        assert_eq!(renderer.call_count(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_wins() {
        let renderer = MemoryRenderer::new()
            .with_tree("dev", "n1", json!({}))
            .with_failure("dev", "n1", RenderError::failed("n1", "dev", "compile error"));
        let err = renderer.render("n1", "dev").await.unwrap_err();
        assert_eq!(err.to_string(), "render of n1 in dev failed: compile error");
    }
}
