//! Error taxonomy for pillar validation.

use std::time::Duration;

use crate::change::KeyPath;
use crate::tree::NodeKind;

/// The external renderer could not produce a tree for a (node, environment) pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("unknown node {node} in environment {environment}")]
    UnknownNode { node: String, environment: String },

    #[error("unknown environment {environment} (rendering node {node})")]
    UnknownEnvironment { node: String, environment: String },

    #[error("renderer unreachable while rendering {node} in {environment}: {message}")]
    Unreachable {
        node: String,
        environment: String,
        message: String,
    },

    #[error("render of {node} in {environment} failed: {message}")]
    Failed {
        node: String,
        environment: String,
        message: String,
    },

    #[error("renderer returned malformed pillar for {node} in {environment}: {message}")]
    Malformed {
        node: String,
        environment: String,
        message: String,
    },

    #[error("render of {node} in {environment} timed out after {timeout:?}")]
    Timeout {
        node: String,
        environment: String,
        timeout: Duration,
    },
}

impl RenderError {
    pub fn failed(
        node: impl Into<String>,
        environment: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Failed {
            node: node.into(),
            environment: environment.into(),
            message: message.into(),
        }
    }

    pub fn malformed(
        node: impl Into<String>,
        environment: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Malformed {
            node: node.into(),
            environment: environment.into(),
            message: message.into(),
        }
    }

    /// Node id the failed render was for.
    pub fn node(&self) -> &str {
        match self {
            Self::UnknownNode { node, .. }
            | Self::UnknownEnvironment { node, .. }
            | Self::Unreachable { node, .. }
            | Self::Failed { node, .. }
            | Self::Malformed { node, .. }
            | Self::Timeout { node, .. } => node,
        }
    }

    /// Environment the failed render was for.
    pub fn environment(&self) -> &str {
        match self {
            Self::UnknownNode { environment, .. }
            | Self::UnknownEnvironment { environment, .. }
            | Self::Unreachable { environment, .. }
            | Self::Failed { environment, .. }
            | Self::Malformed { environment, .. }
            | Self::Timeout { environment, .. } => environment,
        }
    }
}

/// Errors raised while diffing two trees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    #[error("structural mismatch at '{path}': {target} in target, {incoming} in incoming")]
    StructuralMismatch {
        path: KeyPath,
        target: NodeKind,
        incoming: NodeKind,
    },
}

/// Errors produced by a validation run.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid validation request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Diff(#[from] DiffError),
}

/// Result type for validation runs.
pub type Result<T> = std::result::Result<T, ValidationError>;
