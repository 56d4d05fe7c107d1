//! Validation result types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason given when a required identity is blank
pub const REASON_REQUIRED: &str = "identity is required";

/// Reason given when the configured pattern rejects the identity
pub const REASON_FORMAT: &str = "identity has invalid format";

/// Reason given when another, non-exempt owner already holds the identity
pub const REASON_TAKEN: &str = "identity already assigned to another record";

/// Final outcome of validating one identity value
///
/// Carries at most one reason: the first failing check wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// Identity is acceptable for the owner
    Valid,

    /// Identity is rejected
    Invalid {
        /// Human-readable reason, shown to the user as is
        reason: String,
    },
}

impl ValidationOutcome {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ValidationOutcome::Invalid { reason: reason.into() }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    /// Get the rejection reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Valid => None,
            ValidationOutcome::Invalid { reason } => Some(reason),
        }
    }
}

/// Verdict of a single pluggable rule
///
/// The `(is_valid, error_message)` pair of the extension contract; the message
/// only exists on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum RuleVerdict {
    Pass,
    Fail {
        /// Complete user-facing sentence
        message: String,
    },
}

impl RuleVerdict {
    pub fn fail(message: impl Into<String>) -> Self {
        RuleVerdict::Fail { message: message.into() }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, RuleVerdict::Pass)
    }

    /// Flatten into the `(bool, String)` shape; the message is empty on pass
    pub fn into_pair(self) -> (bool, String) {
        match self {
            RuleVerdict::Pass => (true, String::new()),
            RuleVerdict::Fail { message } => (false, message),
        }
    }
}

/// A rule could not produce a verdict
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    /// Script raised an error or could not be called
    #[error("script error: {0}")]
    Script(String),

    /// Script returned something that is neither a bool nor a verdict map
    #[error("malformed verdict: {0}")]
    MalformedVerdict(String),

    /// Unexpected runtime failure (panicked task, etc.)
    #[error("runtime error: {0}")]
    Runtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_reason() {
        assert_eq!(ValidationOutcome::Valid.reason(), None);
        let outcome = ValidationOutcome::invalid(REASON_TAKEN);
        assert!(!outcome.is_valid());
        assert_eq!(outcome.reason(), Some(REASON_TAKEN));
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(ValidationOutcome::invalid("nope")).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "invalid", "reason": "nope" }));

        let json = serde_json::to_value(ValidationOutcome::Valid).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "valid" }));
    }

    #[test]
    fn test_verdict_pair() {
        assert_eq!(RuleVerdict::Pass.into_pair(), (true, String::new()));
        assert_eq!(
            RuleVerdict::fail("The RUT is not valid.").into_pair(),
            (false, "The RUT is not valid.".to_string())
        );
    }
}
