//! Renderer backed by pre-rendered pillar files on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pillar_ci_core::{ConfigTree, PillarRenderer, RenderError, RenderResult};

use crate::pillar::pillar_from_str;

/// Reads `<root>/<environment>/<node>.json`.
#[derive(Debug, Clone)]
pub struct FixtureRenderer {
    root: PathBuf,
}

impl FixtureRenderer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_plain_segment(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}

#[async_trait]
impl PillarRenderer for FixtureRenderer {
    async fn render(&self, node: &str, environment: &str) -> RenderResult<ConfigTree> {
        if !is_plain_segment(environment) {
            return Err(RenderError::UnknownEnvironment {
                node: node.to_string(),
                environment: environment.to_string(),
            });
        }
        if !is_plain_segment(node) {
            return Err(RenderError::UnknownNode {
                node: node.to_string(),
                environment: environment.to_string(),
            });
        }

        let env_dir = self.root.join(environment);
        if !tokio::fs::try_exists(&env_dir).await.unwrap_or(false) {
            return Err(RenderError::UnknownEnvironment {
                node: node.to_string(),
                environment: environment.to_string(),
            });
        }

        let path = env_dir.join(format!("{node}.json"));
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::UnknownNode {
                    node: node.to_string(),
                    environment: environment.to_string(),
                })
            }
            Err(e) => {
                return Err(RenderError::failed(
                    node,
                    environment,
                    format!("{}: {e}", path.display()),
                ))
            }
        };

        pillar_from_str(node, environment, &raw)
    }

    fn name(&self) -> &str {
        "fixtures"
    }
}
