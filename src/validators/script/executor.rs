//! Rhai script executor

use crate::validators::*;
use async_trait::async_trait;
use rhai::{Dynamic, Engine, Map, Scope, AST};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

/// Upper bound on script work per call, stops runaway loops
const MAX_OPERATIONS: u64 = 100_000;

/// Rule backed by a Rhai script exposing `fn validate(identity)`
pub struct RhaiValidator {
    name: String,
    engine: Arc<Engine>,
    ast: Arc<AST>,
}

impl RhaiValidator {
    /// Compile a script file into a rule named `name`
    pub fn from_file(name: String, path: &Path) -> Result<Self, String> {
        debug!("Loading Rhai script: {} from {}", name, path.display());

        let engine = Self::new_engine();
        let ast = engine
            .compile_file(path.to_path_buf())
            .map_err(|e| format!("Failed to compile script '{}': {}", path.display(), e))?;

        Self::from_ast(name, engine, ast)
            .map_err(|e| format!("Script '{}' {}", path.display(), e))
    }

    /// Compile script source held in memory
    pub fn from_source(name: String, source: &str) -> Result<Self, String> {
        let engine = Self::new_engine();
        let ast = engine
            .compile(source)
            .map_err(|e| format!("Failed to compile script '{}': {}", name, e))?;

        Self::from_ast(name, engine, ast)
    }

    fn new_engine() -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        engine
    }

    fn from_ast(name: String, engine: Engine, ast: AST) -> Result<Self, String> {
        if !ast
            .iter_functions()
            .any(|f| f.name == "validate" && f.params.len() == 1)
        {
            return Err("missing 'validate(identity)' function".to_string());
        }

        Ok(Self {
            name,
            engine: Arc::new(engine),
            ast: Arc::new(ast),
        })
    }

    /// Convert the script's return value into a verdict
    ///
    /// Accepts a bare bool or a `#{ valid, message }` map.
    fn to_verdict(name: &str, value: Dynamic) -> Result<RuleVerdict, RuleError> {
        let (valid, message) = if value.is::<bool>() {
            (value.as_bool().unwrap_or(false), None)
        } else if value.is_map() {
            let map = value
                .try_cast::<Map>()
                .ok_or_else(|| RuleError::MalformedVerdict("unreadable map".to_string()))?;

            let valid = map
                .get("valid")
                .and_then(|v| v.as_bool().ok())
                .ok_or_else(|| RuleError::MalformedVerdict("missing boolean 'valid' field".to_string()))?;

            let message = map
                .get("message")
                .and_then(|v| v.clone().into_string().ok())
                .filter(|m| !m.trim().is_empty());

            (valid, message)
        } else {
            return Err(RuleError::MalformedVerdict(format!(
                "expected bool or map, got {}",
                value.type_name()
            )));
        };

        if valid {
            Ok(RuleVerdict::Pass)
        } else {
            Ok(RuleVerdict::fail(message.unwrap_or_else(|| {
                format!("The identity was rejected by the '{}' rule.", name)
            })))
        }
    }
}

#[async_trait]
impl IdentityRule for RhaiValidator {
    async fn validate(&self, identity: &str) -> Result<RuleVerdict, RuleError> {
        let engine = Arc::clone(&self.engine);
        let ast = Arc::clone(&self.ast);
        let name = self.name.clone();
        let identity = identity.to_string();

        // Scripts are CPU-bound; keep them off the async workers
        tokio::task::spawn_blocking(move || {
            let value: Dynamic = engine
                .call_fn(&mut Scope::new(), &ast, "validate", (identity,))
                .map_err(|e| {
                    error!("❌ Script '{}' failed: {}", name, e);
                    RuleError::Script(format!("Script execution failed: {}", e))
                })?;

            Self::to_verdict(&name, value)
        })
        .await
        .map_err(|e| RuleError::Runtime(format!("Script task panicked: {}", e)))?
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Script
    }
}
