//! Rule registry - discovery and ordering of pluggable rules

use super::*;
use crate::config::ExtensionSettings;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ordered, immutable set of discovered rules
///
/// Rules are kept sorted by unit name so the first failing message is the
/// same on every run.
#[derive(Default)]
pub struct ValidatorRegistry {
    rules: Vec<Arc<dyn IdentityRule>>,
}

impl ValidatorRegistry {
    /// Create an empty registry (empty chain)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from already instantiated rules
    ///
    /// When two rules share a name the first one wins.
    pub fn from_rules(rules: impl IntoIterator<Item = Arc<dyn IdentityRule>>) -> Self {
        let mut by_name: BTreeMap<String, Arc<dyn IdentityRule>> = BTreeMap::new();

        for rule in rules {
            let name = rule.name().to_string();
            if by_name.contains_key(&name) {
                warn!("⚠️  Duplicate rule name '{}' ({}), skipping", name, rule.rule_type());
                continue;
            }
            debug!("Registering rule: {} ({})", name, rule.rule_type());
            by_name.insert(name, rule);
        }

        Self {
            rules: by_name.into_values().collect(),
        }
    }

    /// Discover every rule enabled by `settings`
    ///
    /// Built-ins are instantiated by name; scripts are loaded from the
    /// extension directory. A unit that cannot be loaded is logged and
    /// skipped, the rest still load.
    pub fn discover(settings: &ExtensionSettings) -> Self {
        info!("🔧 Discovering identity rules");

        let mut rules = Self::load_builtins(&settings.builtins);
        if let Some(dir) = &settings.directory {
            rules.extend(Self::load_scripts(dir));
        }

        let registry = Self::from_rules(rules);
        info!("✅ Discovered {} identity rules: {:?}", registry.len(), registry.names());
        registry
    }

    fn load_builtins(names: &[String]) -> Vec<Arc<dyn IdentityRule>> {
        names
            .iter()
            .filter_map(|name| {
                let rule = builtin::lookup(name);
                if rule.is_none() {
                    warn!(
                        "⚠️  Unknown built-in rule '{}' (available: {:?}), skipping",
                        name,
                        builtin::BUILTIN_NAMES
                    );
                }
                rule
            })
            .collect()
    }

    fn load_scripts(dir: &Path) -> Vec<Arc<dyn IdentityRule>> {
        let mut rules: Vec<Arc<dyn IdentityRule>> = Vec::new();

        for path in Self::list_script_files(dir) {
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };

            match script::RhaiValidator::from_file(name.clone(), &path) {
                Ok(rule) => rules.push(Arc::new(rule)),
                Err(e) => warn!("⚠️  Skipping rule '{}': {}", name, e),
            }
        }

        rules
    }

    /// Script files in `dir`, sorted by file name
    fn list_script_files(dir: &Path) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Rule directory {} doesn't exist, no script rules", dir.display());
                return Vec::new();
            }
            Err(e) => {
                warn!("⚠️  Cannot read rule directory {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    warn!("⚠️  Unreadable entry in {}: {}", dir.display(), e);
                    None
                }
            })
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(script::SCRIPT_EXTENSION)
            })
            .collect();

        files.sort();
        files
    }

    /// Rules in evaluation order
    pub fn chain(&self) -> &[Arc<dyn IdentityRule>] {
        &self.rules
    }

    /// Get a rule by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn IdentityRule>> {
        self.rules.iter().find(|r| r.name() == name).cloned()
    }

    /// Rule names in evaluation order
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

/// Process-wide holder of the current registry
///
/// Discovery runs once up front; callers take cheap immutable snapshots.
/// [`RuleCatalog::reload`] re-runs discovery and swaps the snapshot, so
/// operators can drop in new scripts without rebuilding. Validations already
/// running keep the snapshot they started with.
pub struct RuleCatalog {
    settings: ExtensionSettings,
    current: RwLock<Arc<ValidatorRegistry>>,
}

impl RuleCatalog {
    /// Discover rules for `settings` and hold them
    pub fn new(settings: ExtensionSettings) -> Self {
        let registry = ValidatorRegistry::discover(&settings);
        Self {
            settings,
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Hold a fixed registry; `reload` then rediscovers from empty settings
    pub fn from_registry(registry: ValidatorRegistry) -> Self {
        Self {
            settings: ExtensionSettings {
                directory: None,
                builtins: Vec::new(),
            },
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Current registry
    pub fn snapshot(&self) -> Arc<ValidatorRegistry> {
        Arc::clone(&*self.current.read())
    }

    /// Rediscover rules and publish them; returns the new rule count
    pub fn reload(&self) -> usize {
        let registry = Arc::new(ValidatorRegistry::discover(&self.settings));
        let count = registry.len();
        *self.current.write() = registry;
        info!("🔄 Reloaded identity rules ({} active)", count);
        count
    }
}

impl std::fmt::Debug for RuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCatalog")
            .field("settings", &self.settings)
            .field("registry", &*self.current.read())
            .finish()
    }
}
