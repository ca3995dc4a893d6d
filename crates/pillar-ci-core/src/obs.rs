//! Structured observability hooks for the validation lifecycle.
//!
//! Events are emitted at `info!` level (renders at `debug!`), each carrying an
//! `event` field so log pipelines can filter on it.

use tracing::{debug, info, warn};

/// RAII guard that enters a run-scoped span for the duration of a validation.
pub struct ValidationSpan {
    _span: tracing::span::EnteredSpan,
}

impl ValidationSpan {
    pub fn enter(run_id: &str, target: &str, incoming: &str) -> Self {
        Self {
            _span: validation_span(run_id, target, incoming).entered(),
        }
    }
}

/// Span for an async validation run; attach with `tracing::Instrument`.
pub fn validation_span(run_id: &str, target: &str, incoming: &str) -> tracing::Span {
    tracing::info_span!(
        "pillar_ci.validation",
        run_id = %run_id,
        target = %target,
        incoming = %incoming,
    )
}

pub fn emit_validation_started(run_id: &str, node_count: usize, renderer: &str) {
    info!(
        event = "validation.started",
        run_id = %run_id,
        nodes = node_count,
        renderer = %renderer,
    );
}

pub fn emit_render_completed(node: &str, environment: &str, duration_ms: u64) {
    debug!(
        event = "render.completed",
        node = %node,
        environment = %environment,
        duration_ms = duration_ms,
    );
}

pub fn emit_render_failed(node: &str, environment: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "render.failed",
        node = %node,
        environment = %environment,
        error = %error,
    );
}

pub fn emit_validation_finished(run_id: &str, duration_ms: u64, changes: usize) {
    info!(
        event = "validation.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        changes = changes,
    );
}

pub fn emit_gate_evaluated(passed: bool, violations: usize) {
    info!(event = "gate.evaluated", passed = passed, violations = violations);
}
