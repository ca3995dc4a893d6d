//! The seam to the external pillar renderer.
//!
//! Rendering is the slow, fallible part of a validation run: compiling pillar
//! for one node in one environment on the configuration master. Adapters live
//! outside this crate; in-memory fakes are in [`crate::fakes`].

use async_trait::async_trait;

use crate::error::RenderError;
use crate::tree::ConfigTree;

/// Result type for render operations
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Produces the fully-resolved pillar tree for a node in an environment.
///
/// Implementations must be safe to call concurrently; the aggregator issues
/// several renders at once.
#[async_trait]
pub trait PillarRenderer: Send + Sync {
    /// Render pillar for `node` resolved against `environment`.
    async fn render(&self, node: &str, environment: &str) -> RenderResult<ConfigTree>;

    /// Short adapter name for logs.
    fn name(&self) -> &str;
}

