//! Script validators loaded from `.rhai` files

mod executor;

pub use executor::RhaiValidator;

/// File extension of script units
pub const SCRIPT_EXTENSION: &str = "rhai";
