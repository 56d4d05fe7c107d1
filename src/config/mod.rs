//! Configuration module for dni-guard.
//!
//! This module handles loading the TOML configuration file, the runtime
//! settings view the engine reads on every call, and pattern compilation.

mod config;
pub mod pattern;
pub mod settings;

pub use config::{
    Config,
    ExtensionSettings,
    IdentitySettings,
    LoggingSettings,
    StoreSettings,
};
pub use pattern::{compile_pattern, PatternCache, PatternError};
pub use settings::{SettingValue, SettingsSource, SharedSettings, ValidationConfig};
