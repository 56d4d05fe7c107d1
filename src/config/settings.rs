//! Runtime settings consumed by the engine
//!
//! The host owns its configuration store; the engine only reads it through
//! [`SettingsSource`] and turns it into a [`ValidationConfig`] snapshot on
//! every call.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const REQUIRED: &str = "required";
pub const PATTERN: &str = "pattern";
pub const ENFORCE_UNIQUENESS: &str = "enforce_uniqueness";
pub const USE_EXTENSIONS: &str = "use_extensions";

/// A single configuration value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
}

impl SettingValue {
    /// Truthiness the way configuration stores usually encode flags
    pub fn as_bool(&self) -> bool {
        match self {
            SettingValue::Bool(b) => *b,
            SettingValue::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Text(s) => s.clone(),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Bool(b)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Text(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::Text(s)
    }
}

/// Read-only view of the host's configuration store
pub trait SettingsSource: Send + Sync {
    fn get(&self, name: &str) -> Option<SettingValue>;
}

/// Immutable per-call snapshot of the engine switches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationConfig {
    pub required: bool,
    /// Never `Some("")`; an empty pattern means no pattern
    pub pattern: Option<String>,
    pub enforce_uniqueness: bool,
    pub use_extensions: bool,
}

impl ValidationConfig {
    /// Read the current switches; missing settings are off
    pub fn from_source(source: &dyn SettingsSource) -> Self {
        let flag = |name: &str| source.get(name).map(|v| v.as_bool()).unwrap_or(false);

        Self {
            required: flag(REQUIRED),
            pattern: source
                .get(PATTERN)
                .map(|v| v.as_text().trim().to_string())
                .filter(|p| !p.is_empty()),
            enforce_uniqueness: flag(ENFORCE_UNIQUENESS),
            use_extensions: flag(USE_EXTENSIONS),
        }
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let pattern = pattern.trim();
        self.pattern = if pattern.is_empty() { None } else { Some(pattern.to_string()) };
        self
    }

    pub fn with_uniqueness(mut self, enforce: bool) -> Self {
        self.enforce_uniqueness = enforce;
        self
    }

    pub fn with_extensions(mut self, enabled: bool) -> Self {
        self.use_extensions = enabled;
        self
    }
}

/// Mutable, thread-safe settings map
///
/// Hosts may change values at any time; each validation picks up whatever is
/// current when it starts.
#[derive(Debug, Default)]
pub struct SharedSettings {
    values: RwLock<HashMap<String, SettingValue>>,
}

impl SharedSettings {
    /// Create settings holding the defaults
    pub fn new() -> Self {
        let settings = Self::default();
        settings.set(REQUIRED, false);
        settings.set(PATTERN, "");
        settings.set(ENFORCE_UNIQUENESS, false);
        settings.set(USE_EXTENSIONS, false);
        settings
    }

    pub fn set(&self, name: &str, value: impl Into<SettingValue>) {
        self.values.write().insert(name.to_string(), value.into());
    }

    /// Snapshot of every value, for display
    pub fn all(&self) -> HashMap<String, SettingValue> {
        self.values.read().clone()
    }
}

impl SettingsSource for SharedSettings {
    fn get(&self, name: &str) -> Option<SettingValue> {
        self.values.read().get(name).cloned()
    }
}

impl SettingsSource for HashMap<String, SettingValue> {
    fn get(&self, name: &str) -> Option<SettingValue> {
        HashMap::get(self, name).cloned()
    }
}
