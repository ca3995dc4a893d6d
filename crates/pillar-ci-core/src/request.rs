//! The unit of work for one CI validation run.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Node ids plus the two environments to compare.
///
/// Deserialization goes through [`ValidationRequest::new`], so decoded requests
/// are deduplicated and checked the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawValidationRequest")]
pub struct ValidationRequest {
    nodes: Vec<String>,
    target_environment: String,
    incoming_environment: String,
}

#[derive(Deserialize)]
struct RawValidationRequest {
    nodes: Vec<String>,
    target_environment: String,
    incoming_environment: String,
}

impl TryFrom<RawValidationRequest> for ValidationRequest {
    type Error = ValidationError;

    fn try_from(raw: RawValidationRequest) -> Result<Self, Self::Error> {
        Self::new(raw.nodes, raw.target_environment, raw.incoming_environment)
    }
}

impl ValidationRequest {
    /// Build a request. Duplicate node ids are dropped, keeping the first occurrence.
    pub fn new<I, S>(
        nodes: I,
        target_environment: impl Into<String>,
        incoming_environment: impl Into<String>,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let target_environment = target_environment.into();
        let incoming_environment = incoming_environment.into();

        if target_environment.trim().is_empty() {
            return Err(ValidationError::InvalidRequest(
                "target environment must not be empty".to_string(),
            ));
        }
        if incoming_environment.trim().is_empty() {
            return Err(ValidationError::InvalidRequest(
                "incoming environment must not be empty".to_string(),
            ));
        }

        let mut unique: Vec<String> = Vec::new();
        for node in nodes {
            let node = node.into();
            if node.trim().is_empty() {
                return Err(ValidationError::InvalidRequest(
                    "node ids must not be empty".to_string(),
                ));
            }
            if !unique.contains(&node) {
                unique.push(node);
            }
        }

        Ok(Self {
            nodes: unique,
            target_environment,
            incoming_environment,
        })
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn target_environment(&self) -> &str {
        &self.target_environment
    }

    pub fn incoming_environment(&self) -> &str {
        &self.incoming_environment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupes_keeping_first_occurrence() {
        let req = ValidationRequest::new(["b", "a", "b", "c", "a"], "base", "dev").unwrap();
        assert_eq!(req.nodes(), &["b", "a", "c"]);
        assert_eq!(req.target_environment(), "base");
        assert_eq!(req.incoming_environment(), "dev");
    }

    #[test]
    fn test_empty_node_list_is_valid() {
        let req = ValidationRequest::new(Vec::<String>::new(), "base", "dev").unwrap();
        assert!(req.nodes().is_empty());
    }

    #[test]
    fn test_rejects_blank_inputs() {
        assert!(matches!(
            ValidationRequest::new(["n1"], "", "dev"),
            Err(ValidationError::InvalidRequest(_))
        ));
        assert!(matches!(
            ValidationRequest::new(["n1"], "base", "  "),
            Err(ValidationError::InvalidRequest(_))
        ));
        assert!(matches!(
            ValidationRequest::new([""], "base", "dev"),
            Err(ValidationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_deserialize_applies_same_checks() {
        let req: ValidationRequest = serde_json::from_str(
            r#"{"nodes": ["n2", "n1", "n2"], "target_environment": "base", "incoming_environment": "dev"}"#,
        )
        .unwrap();
        assert_eq!(req.nodes(), &["n2", "n1"]);

        let blank = serde_json::from_str::<ValidationRequest>(
            r#"{"nodes": ["n1"], "target_environment": " ", "incoming_environment": "dev"}"#,
        );
        assert!(blank.unwrap_err().to_string().contains("target environment"));
    }
}
