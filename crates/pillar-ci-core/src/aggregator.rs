//! Per-node aggregation: render every node in both environments, then diff once.
//!
//! Rendering runs with a bounded number of in-flight calls per environment and
//! both environments are fetched at the same time. The first render failure
//! aborts the run and drops whatever is still in flight; the diff phase only
//! starts once both snapshots are complete.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::Instrument;
use uuid::Uuid;

use crate::change::{ChangeRecord, KeyPath};
use crate::diff::{DiffOptions, TreeDiffer};
use crate::error::{DiffError, RenderError, Result};
use crate::obs;
use crate::renderer::{PillarRenderer, RenderResult};
use crate::report::ValidationReport;
use crate::request::ValidationRequest;
use crate::snapshot::EnvironmentSnapshot;
use crate::tree::ConfigTree;

/// Default number of concurrent renders per environment.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default bound on a single render call.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorOptions {
    /// Maximum in-flight renders per environment (values below 1 act as 1).
    pub concurrency: usize,
    /// Upper bound on each render call; `None` waits indefinitely.
    pub render_timeout: Option<Duration>,
    pub diff: DiffOptions,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            render_timeout: Some(DEFAULT_RENDER_TIMEOUT),
            diff: DiffOptions::default(),
        }
    }
}

impl AggregatorOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_render_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn with_diff(mut self, diff: DiffOptions) -> Self {
        self.diff = diff;
        self
    }
}

/// Drives a validation run against an external renderer.
pub struct EnvironmentAggregator {
    renderer: Arc<dyn PillarRenderer>,
    options: AggregatorOptions,
    differ: TreeDiffer,
}

impl EnvironmentAggregator {
    pub fn new(renderer: Arc<dyn PillarRenderer>, options: AggregatorOptions) -> Self {
        Self {
            renderer,
            differ: TreeDiffer::new(options.diff),
            options,
        }
    }

    pub fn options(&self) -> &AggregatorOptions {
        &self.options
    }

    /// Validate a request and return the ordered change records.
    pub async fn validate(&self, request: &ValidationRequest) -> Result<Vec<ChangeRecord>> {
        Ok(self.validate_report(request).await?.changes)
    }

    /// Validate a request and return the full report.
    pub async fn validate_report(&self, request: &ValidationRequest) -> Result<ValidationReport> {
        let run_id = Uuid::new_v4();
        let span = obs::validation_span(
            &run_id.to_string(),
            request.target_environment(),
            request.incoming_environment(),
        );
        self.run(run_id, request).instrument(span).await
    }

    async fn run(&self, run_id: Uuid, request: &ValidationRequest) -> Result<ValidationReport> {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id_str = run_id.to_string();

        obs::emit_validation_started(&run_id_str, request.nodes().len(), self.renderer.name());

        let (target, incoming) = tokio::try_join!(
            self.fetch_snapshot(request.nodes(), request.target_environment()),
            self.fetch_snapshot(request.nodes(), request.incoming_environment()),
        )?;

        let changes = self.compare_snapshots(&target, &incoming)?;
        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_validation_finished(&run_id_str, duration_ms, changes.len());

        Ok(ValidationReport::from_snapshots(
            run_id,
            &target,
            &incoming,
            changes,
            started_at,
            duration_ms,
        ))
    }

    /// Render every node in one environment, keeping input order.
    pub async fn fetch_snapshot(
        &self,
        nodes: &[String],
        environment: &str,
    ) -> RenderResult<EnvironmentSnapshot> {
        let rendered: Vec<(String, ConfigTree)> = stream::iter(nodes)
            .map(|node| self.render_one(node, environment))
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await?;
        Ok(EnvironmentSnapshot::from_nodes(environment, rendered))
    }

    /// The diff phase alone: compare two complete snapshots keyed by node id.
    pub fn compare_snapshots(
        &self,
        target: &EnvironmentSnapshot,
        incoming: &EnvironmentSnapshot,
    ) -> std::result::Result<Vec<ChangeRecord>, DiffError> {
        self.differ
            .diff_mappings(&target.nodes, &incoming.nodes, &KeyPath::root())
    }

    async fn render_one(&self, node: &str, environment: &str) -> RenderResult<(String, ConfigTree)> {
        let start = Instant::now();
        let render = self.renderer.render(node, environment);

        let rendered = match self.options.render_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, render).await {
                Ok(result) => result,
                Err(_) => Err(RenderError::Timeout {
                    node: node.to_string(),
                    environment: environment.to_string(),
                    timeout,
                }),
            },
            None => render.await,
        };

        match rendered {
            Ok(tree) => {
                obs::emit_render_completed(node, environment, start.elapsed().as_millis() as u64);
                Ok((node.to_string(), tree))
            }
            Err(err) => {
                obs::emit_render_failed(node, environment, &err);
                Err(err)
            }
        }
    }
}
