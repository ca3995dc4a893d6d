//! CI gate evaluation over a change list.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::change::{ChangeKind, ChangeRecord};
use crate::obs;

/// Gate evaluation verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// Flat changes that caused failure (empty if passed).
    pub violations: Vec<String>,

    /// Summary message.
    pub message: String,
}

/// Which changes are expected and which fail the gate.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    /// Flat changes matching any of these patterns are expected.
    pub allow: Vec<Regex>,

    /// Kinds that fail the gate when not allowed.
    pub fail_on: Vec<ChangeKind>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            allow: Vec::new(),
            fail_on: ChangeKind::ALL.to_vec(),
        }
    }
}

impl GatePolicy {
    /// Build a policy from allow patterns in regex syntax.
    pub fn with_allow_patterns<I, S>(mut self, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.allow.push(Regex::new(pattern.as_ref())?);
        }
        Ok(self)
    }

    pub fn with_fail_on(mut self, kinds: Vec<ChangeKind>) -> Self {
        self.fail_on = kinds;
        self
    }

    fn is_allowed(&self, flat: &str) -> bool {
        self.allow.iter().any(|re| re.is_match(flat))
    }
}

/// CI gate evaluation rules.
pub struct ChangeGate;

impl ChangeGate {
    /// Evaluate a change list against `policy`.
    ///
    /// A change is a violation when its kind is in `fail_on` and no allow
    /// pattern matches its flat `path;kind` form.
    pub fn evaluate(changes: &[ChangeRecord], policy: &GatePolicy) -> GateVerdict {
        let violations: Vec<String> = changes
            .iter()
            .filter(|change| policy.fail_on.contains(&change.kind))
            .map(ToString::to_string)
            .filter(|flat| !policy.is_allowed(flat))
            .collect();

        let passed = violations.is_empty();
        let message = if passed {
            format!("No unexpected pillar changes ({} change(s) allowed)", changes.len())
        } else {
            format!("Gate failed with {} unexpected change(s)", violations.len())
        };

        obs::emit_gate_evaluated(passed, violations.len());

        GateVerdict {
            passed,
            violations,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::KeyPath;

    fn change(flat: &str) -> ChangeRecord {
        flat.parse().unwrap()
    }

    #[test]
    fn test_no_changes_passes() {
        let verdict = ChangeGate::evaluate(&[], &GatePolicy::default());
        assert!(verdict.passed);
        assert!(verdict.violations.is_empty());
    }

    #[test]
    fn test_any_change_fails_default_policy() {
        let changes = vec![ChangeRecord::modified(KeyPath::from(vec!["n1", "x"]))];
        let verdict = ChangeGate::evaluate(&changes, &GatePolicy::default());
        assert!(!verdict.passed);
        assert_eq!(verdict.violations, vec!["n1:x;modified"]);
        assert!(verdict.message.contains("1 unexpected"));
    }

    #[test]
    fn test_allow_patterns() {
        let policy = GatePolicy::default()
            .with_allow_patterns([r"^[^:]+:app:version;modified$"])
            .unwrap();
        let changes = vec![
            change("web01:app:version;modified"),
            change("web02:app:version;modified"),
            change("web01:app:port;modified"),
        ];
        let verdict = ChangeGate::evaluate(&changes, &policy);
        assert!(!verdict.passed);
        assert_eq!(verdict.violations, vec!["web01:app:port;modified"]);
    }

    #[test]
    fn test_fail_on_subset_of_kinds() {
        let policy = GatePolicy::default().with_fail_on(vec![ChangeKind::Removed]);
        let changes = vec![change("n1:a;added"), change("n1:b;modified")];
        assert!(ChangeGate::evaluate(&changes, &policy).passed);

        let changes = vec![change("n1:a;removed")];
        assert!(!ChangeGate::evaluate(&changes, &policy).passed);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(GatePolicy::default().with_allow_patterns(["("]).is_err());
    }
}
