//! Core rule traits and interfaces
//!
//! This module defines the contract every pluggable identity rule implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The trait all pluggable identity rules implement.
///
/// Rules are stateless across calls: the same identity always yields the
/// same verdict. Built-in rules answer synchronously; script rules hop onto
/// the blocking pool.
#[async_trait]
pub trait IdentityRule: Send + Sync {
    /// Check an identity value
    ///
    /// # Returns
    /// * `Ok(RuleVerdict)` - The rule's verdict
    /// * `Err(RuleError)` - If the rule could not be evaluated
    async fn validate(
        &self,
        identity: &str,
    ) -> Result<super::RuleVerdict, super::RuleError>;

    /// Unit name, used for ordering and logging
    fn name(&self) -> &str;

    /// Where this rule came from
    fn rule_type(&self) -> RuleType;
}

/// Kind of rule backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Builtin,
    Script,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleType::Builtin => write!(f, "builtin"),
            RuleType::Script => write!(f, "script"),
        }
    }
}
