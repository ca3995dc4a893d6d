//! Pillar CI core library
//!
//! Compares rendered configuration-management pillar for a set of nodes across
//! two environments and reports which keys were added, removed, or modified:
//! - [`tree`]: the rendered pillar model
//! - [`diff`]: the recursive tree differ
//! - [`aggregator`]: renders every node in both environments and diffs once
//! - [`gate`] and [`report`]: what a CI job does with the result

pub mod aggregator;
pub mod change;
pub mod diff;
pub mod error;
pub mod fakes;
pub mod gate;
pub mod obs;
pub mod renderer;
pub mod report;
pub mod request;
pub mod snapshot;
pub mod telemetry;
pub mod tree;

pub use aggregator::{
    AggregatorOptions, EnvironmentAggregator, DEFAULT_CONCURRENCY, DEFAULT_RENDER_TIMEOUT,
};
pub use change::{
    flatten, group_by_node, ChangeKind, ChangeParseError, ChangeRecord, ChangeSummary, KeyPath,
};
pub use diff::{diff_trees, DiffOptions, MismatchPolicy, TreeDiffer};
pub use error::{DiffError, RenderError, Result, ValidationError};
pub use gate::{ChangeGate, GatePolicy, GateVerdict};
pub use renderer::{PillarRenderer, RenderResult};
pub use report::ValidationReport;
pub use request::ValidationRequest;
pub use snapshot::{EnvironmentSnapshot, NodeDelta};
pub use telemetry::init_tracing;
pub use tree::{canonical_value, leaf_values_equal, ConfigTree, Mapping, NodeKind};
