//! # dni-guard - Pluggable Identity Number Validation
//!
//! Decides whether a free-form identity value (a national ID number) may be
//! attached to a record.
//!
//! ## Features
//! - Required and pattern checks driven by live settings
//! - Uniqueness across owners, with exempt (guest) holders ignored
//! - Pluggable rules: built-ins enabled by name and Rhai scripts dropped
//!   into a directory, run in a stable order
//! - RUT mod-11 check-digit rule
//! - Validate-then-commit hand-off for records that don't exist yet

pub mod config;
pub mod engine;
pub mod store;
pub mod validators;

pub use config::{Config, SettingsSource, SharedSettings, ValidationConfig};
pub use engine::{EngineError, Staged, ValidationEngine};
pub use store::{AssignmentStore, MemoryStore, OwnerLookup, StoreError};
pub use validators::{
    ExistingOwner, IdentityRule, OwnerRef, PendingAssignment, RuleCatalog, RuleVerdict,
    ValidationOutcome, ValidatorRegistry,
};
