//! Pluggable rule framework for dni-guard
//!
//! This module provides the extension point of the identity engine: rules
//! that run after the core checks, supplied either as built-ins enabled by
//! name or as Rhai scripts dropped into a directory.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Rule Catalog / Registry           │
//! ├─────────────────────────────────────────┤
//! │  • Discover rules from config           │
//! │  • Skip units that fail to load         │
//! │  • Hand out ordered, immutable chains   │
//! └────────┬────────────────────────────────┘
//!          │
//!          ├──> Built-in Rules (RUT check digit)
//!          └──> Rhai Script Rules (*.rhai)
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use dni_guard::config::ExtensionSettings;
//! use dni_guard::validators::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = RuleCatalog::new(ExtensionSettings {
//!     directory: Some("validators".into()),
//!     builtins: vec!["rut".to_string()],
//! });
//!
//! for rule in catalog.snapshot().chain() {
//!     let verdict = rule.validate("12.345.678-5").await?;
//!     println!("{}: {:?}", rule.name(), verdict);
//! }
//! # Ok(())
//! # }
//! ```

pub mod builtin;
pub mod context;
pub mod registry;
pub mod result;
pub mod script;
pub mod traits;

// Re-export commonly used types
pub use context::{ExistingOwner, OwnerRef, PendingAssignment};
pub use registry::{RuleCatalog, ValidatorRegistry};
pub use result::{RuleError, RuleVerdict, ValidationOutcome};
pub use traits::{IdentityRule, RuleType};
