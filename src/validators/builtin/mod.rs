//! Built-in rules
//!
//! Compiled into the binary but enabled per deployment by name, exactly like
//! any other discovered unit.

mod rut;

pub use rut::{ChecksumError, RutChecksum, RutValidator};

use super::IdentityRule;
use std::sync::Arc;

/// Names of every built-in rule
pub const BUILTIN_NAMES: &[&str] = &[RutValidator::NAME];

/// Instantiate a built-in rule by name
pub fn lookup(name: &str) -> Option<Arc<dyn IdentityRule>> {
    match name {
        RutValidator::NAME => Some(Arc::new(RutValidator::new())),
        _ => None,
    }
}
