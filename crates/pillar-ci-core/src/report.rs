//! Validation report artifacts.
//!
//! A [`ValidationReport`] is what a CI job publishes: the ordered change list,
//! which data was compared (snapshot digests), and the whole-node delta that the
//! differ deliberately leaves out.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::change::{flatten, group_by_node, ChangeRecord, ChangeSummary, KeyPath};
use crate::diff::TreeDiffer;
use crate::error::DiffError;
use crate::snapshot::{EnvironmentSnapshot, NodeDelta};

/// Outcome of one validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub run_id: Uuid,
    pub target_environment: String,
    pub incoming_environment: String,
    pub nodes: Vec<String>,
    pub changes: Vec<ChangeRecord>,
    pub node_delta: NodeDelta,
    pub target_digest: String,
    pub incoming_digest: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ValidationReport {
    /// Assemble a report from two complete snapshots and their change list.
    pub fn from_snapshots(
        run_id: Uuid,
        target: &EnvironmentSnapshot,
        incoming: &EnvironmentSnapshot,
        changes: Vec<ChangeRecord>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let mut nodes: Vec<String> = target.node_ids().map(str::to_string).collect();
        nodes.extend(
            incoming
                .node_ids()
                .filter(|id| target.get(id).is_none())
                .map(str::to_string),
        );

        Self {
            run_id,
            target_environment: target.environment.clone(),
            incoming_environment: incoming.environment.clone(),
            nodes,
            changes,
            node_delta: target.node_delta(incoming),
            target_digest: target.digest(),
            incoming_digest: incoming.digest(),
            started_at,
            duration_ms,
        }
    }

    /// Diff two snapshots that were rendered elsewhere.
    pub fn compare(
        target: &EnvironmentSnapshot,
        incoming: &EnvironmentSnapshot,
        differ: &TreeDiffer,
    ) -> Result<Self, DiffError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let changes = differ.diff_mappings(&target.nodes, &incoming.nodes, &KeyPath::root())?;
        Ok(Self::from_snapshots(
            Uuid::new_v4(),
            target,
            incoming,
            changes,
            started_at,
            start.elapsed().as_millis() as u64,
        ))
    }

    /// Changes in the flat `a:b;kind` form, in report order.
    pub fn flat_changes(&self) -> Vec<String> {
        flatten(&self.changes)
    }

    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary::from_changes(&self.changes)
    }

    /// True when neither leaf changes nor whole-node changes were found.
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty() && self.node_delta.is_empty()
    }

    /// One flat change per line followed by a summary line.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for line in self.flat_changes() {
            out.push_str(&line);
            out.push('\n');
        }
        for node in &self.node_delta.added {
            out.push_str(&format!("node {} only in {}\n", node, self.incoming_environment));
        }
        for node in &self.node_delta.removed {
            out.push_str(&format!("node {} only in {}\n", node, self.target_environment));
        }
        out.push_str(&format!(
            "{} -> {}: {}\n",
            self.target_environment,
            self.incoming_environment,
            self.summary()
        ));
        out
    }

    /// Markdown suitable for a pull-request comment, grouped by node.
    pub fn render_markdown(&self) -> String {
        let mut md = format!(
            "# Pillar diff: `{}` → `{}`\n",
            self.target_environment, self.incoming_environment
        );
        md.push_str(&format!(
            "\n{} node(s) compared, {}.\n",
            self.nodes.len(),
            self.summary()
        ));

        md.push_str("\n## Changes\n\n");
        if self.changes.is_empty() {
            md.push_str("identical\n");
        } else {
            for (node, changes) in group_by_node(&self.changes) {
                md.push_str(&format!("### {}\n\n", node));
                for change in changes {
                    md.push_str(&format!("- **{}**: `{}`\n", change.kind, change.path));
                }
                md.push('\n');
            }
        }

        if !self.node_delta.is_empty() {
            md.push_str("\n## Nodes\n\n");
            for node in &self.node_delta.added {
                md.push_str(&format!("- **added**: `{}`\n", node));
            }
            for node in &self.node_delta.removed {
                md.push_str(&format!("- **removed**: `{}`\n", node));
            }
        }

        md.push_str(&format!(
            "\n<sub>run {} · target {} · incoming {}</sub>\n",
            self.run_id,
            short(&self.target_digest),
            short(&self.incoming_digest)
        ));
        md
    }
}

fn short(digest: &str) -> &str {
    &digest[..12.min(digest.len())]
}
