//! Configuration file structures for dni-guard.
//!
//! Deserializes the TOML configuration and turns it into the runtime pieces
//! the engine consumes: seeded [`SharedSettings`] and the
//! [`ExtensionSettings`] used for rule discovery.

use super::pattern::compile_pattern;
use super::settings::{self, SharedSettings};
use crate::validators::builtin;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Main configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub identity: IdentitySettings,
    #[serde(default)]
    pub extensions: ExtensionSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Switches of the core checks
///
/// # Example TOML
/// ```toml
/// [identity]
/// required = true
/// pattern = "/^[0-9.]+-[0-9k]$/i"
/// enforce_uniqueness = true
/// use_extensions = true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentitySettings {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub enforce_uniqueness: bool,
    #[serde(default)]
    pub use_extensions: bool,
}

/// Where pluggable rules come from
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionSettings {
    /// Directory scanned for `*.rhai` rules
    #[serde(default = "default_extension_dir")]
    pub directory: Option<PathBuf>,

    /// Built-in rules to enable, by name
    #[serde(default)]
    pub builtins: Vec<String>,
}

fn default_extension_dir() -> Option<PathBuf> {
    Some(PathBuf::from("validators"))
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            directory: default_extension_dir(),
            builtins: Vec::new(),
        }
    }
}

/// Assignment store used by the command line tool
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/assignments.json")
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Check the configuration for errors that would otherwise only show up
    /// at validation time
    pub fn validate(&self) -> Result<(), String> {
        let pattern = self.identity.pattern.trim();
        if !pattern.is_empty() {
            compile_pattern(pattern)
                .map_err(|e| format!("identity.pattern '{}': {}", pattern, e))?;
        }

        for name in &self.extensions.builtins {
            if builtin::lookup(name).is_none() {
                return Err(format!(
                    "extensions.builtins: unknown rule '{}' (available: {})",
                    name,
                    builtin::BUILTIN_NAMES.join(", ")
                ));
            }
        }

        if self.identity.use_extensions
            && self.extensions.builtins.is_empty()
            && self.extensions.directory.is_none()
        {
            warn!("identity.use_extensions is on but no rule source is configured");
        }

        Ok(())
    }

    /// Runtime settings seeded from the `[identity]` section
    pub fn settings(&self) -> SharedSettings {
        let shared = SharedSettings::new();
        shared.set(settings::REQUIRED, self.identity.required);
        shared.set(settings::PATTERN, self.identity.pattern.trim());
        shared.set(settings::ENFORCE_UNIQUENESS, self.identity.enforce_uniqueness);
        shared.set(settings::USE_EXTENSIONS, self.identity.use_extensions);
        shared
    }
}
