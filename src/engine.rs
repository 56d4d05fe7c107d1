//! Identity validation engine
//!
//! Runs the ordered chain of checks for one identity value:
//!
//! ```text
//! required ──> pattern ──> uniqueness ──> pluggable rules ──> Valid
//!     │           │             │                │
//!     └───────────┴─────────────┴────────────────┴──> Invalid(first reason)
//! ```
//!
//! The engine is a pure function of its inputs plus one read through
//! [`OwnerLookup`]; it never writes. Callers needing a deadline wrap
//! [`ValidationEngine::validate`] in their own timeout.

use crate::config::{PatternCache, SettingsSource, ValidationConfig};
use crate::store::{OwnerLookup, StoreError};
use crate::validators::result::{REASON_FORMAT, REASON_REQUIRED, REASON_TAKEN};
use crate::validators::*;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Infrastructure failure while validating. Not a user-facing outcome.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The owner lookup could not be performed
    #[error("owner lookup failed: {0}")]
    Lookup(#[from] StoreError),

    /// A pluggable rule could not produce a verdict
    #[error("rule '{rule}' failed: {source}")]
    Rule {
        rule: String,
        #[source]
        source: RuleError,
    },
}

/// Result of [`ValidationEngine::stage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged {
    /// Value accepted; commit it once the owner exists
    Accepted(PendingAssignment),
    Rejected { reason: String },
}

/// Validation engine wired to the host's collaborators
pub struct ValidationEngine {
    settings: Arc<dyn SettingsSource>,
    lookup: Arc<dyn OwnerLookup>,
    rules: Arc<RuleCatalog>,
    patterns: PatternCache,
}

impl ValidationEngine {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        lookup: Arc<dyn OwnerLookup>,
        rules: Arc<RuleCatalog>,
    ) -> Self {
        Self {
            settings,
            lookup,
            rules,
            patterns: PatternCache::new(),
        }
    }

    /// Validate `identity` for `owner` against the current settings and rules
    ///
    /// `owner` is `None` while the record is still being created.
    pub async fn validate(
        &self,
        identity: &str,
        owner: Option<OwnerRef>,
    ) -> Result<ValidationOutcome, EngineError> {
        // Settings are read per call so host changes apply immediately
        let config = ValidationConfig::from_source(self.settings.as_ref());
        let registry = self.rules.snapshot();

        Self::run_checks(identity, owner, &config, self.lookup.as_ref(), &registry, &self.patterns)
            .await
    }

    /// Validate and, on success, hand back the value for a later commit
    pub async fn stage(
        &self,
        identity: &str,
        owner: Option<OwnerRef>,
    ) -> Result<Staged, EngineError> {
        match self.validate(identity, owner).await? {
            ValidationOutcome::Valid => Ok(Staged::Accepted(PendingAssignment::new(
                identity.to_string(),
                owner,
            ))),
            ValidationOutcome::Invalid { reason } => Ok(Staged::Rejected { reason }),
        }
    }

    /// Run every check once with explicit inputs
    pub async fn evaluate(
        identity: &str,
        owner: Option<OwnerRef>,
        config: &ValidationConfig,
        lookup: &dyn OwnerLookup,
        registry: &ValidatorRegistry,
    ) -> Result<ValidationOutcome, EngineError> {
        Self::run_checks(identity, owner, config, lookup, registry, &PatternCache::new()).await
    }

    async fn run_checks(
        identity: &str,
        owner: Option<OwnerRef>,
        config: &ValidationConfig,
        lookup: &dyn OwnerLookup,
        registry: &ValidatorRegistry,
        patterns: &PatternCache,
    ) -> Result<ValidationOutcome, EngineError> {
        if config.required && identity.trim().is_empty() {
            debug!("Identity rejected: required but blank");
            return Ok(ValidationOutcome::invalid(REASON_REQUIRED));
        }

        if let Some(pattern) = &config.pattern {
            if let Some(outcome) = Self::check_pattern(identity, pattern, patterns) {
                return Ok(outcome);
            }
        }

        if config.enforce_uniqueness {
            if let Some(outcome) = Self::check_uniqueness(identity, owner, lookup).await? {
                return Ok(outcome);
            }
        }

        if config.use_extensions {
            if let Some(outcome) = Self::run_rules(identity, registry).await? {
                return Ok(outcome);
            }
        }

        Ok(ValidationOutcome::Valid)
    }

    /// A pattern that does not compile rejects every value
    fn check_pattern(
        identity: &str,
        pattern: &str,
        patterns: &PatternCache,
    ) -> Option<ValidationOutcome> {
        match patterns.get(pattern) {
            Ok(re) if re.is_match(identity) => None,
            Ok(_) => {
                debug!("Identity rejected: does not match pattern");
                Some(ValidationOutcome::invalid(REASON_FORMAT))
            }
            Err(e) => {
                error!("❌ Configured identity pattern '{}' is unusable: {}", pattern, e);
                Some(ValidationOutcome::invalid(REASON_FORMAT))
            }
        }
    }

    async fn check_uniqueness(
        identity: &str,
        owner: Option<OwnerRef>,
        lookup: &dyn OwnerLookup,
    ) -> Result<Option<ValidationOutcome>, EngineError> {
        let holders = lookup.find_owners(identity).await?;

        match holders.iter().find(|holder| holder.blocks(owner)) {
            Some(holder) => {
                debug!("Identity rejected: already held by owner {}", holder.owner);
                Ok(Some(ValidationOutcome::invalid(REASON_TAKEN)))
            }
            None => Ok(None),
        }
    }

    async fn run_rules(
        identity: &str,
        registry: &ValidatorRegistry,
    ) -> Result<Option<ValidationOutcome>, EngineError> {
        for rule in registry.chain() {
            let verdict = rule.validate(identity).await.map_err(|source| EngineError::Rule {
                rule: rule.name().to_string(),
                source,
            })?;

            if let RuleVerdict::Fail { message } = verdict {
                debug!("Identity rejected by rule '{}'", rule.name());
                return Ok(Some(ValidationOutcome::Invalid { reason: message }));
            }
        }

        Ok(None)
    }
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("rules", &self.rules)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{settings as keys, SharedSettings};
    use crate::store::{AssignmentStore, MemoryStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lookup returning a fixed holder list
    struct Holders(Vec<ExistingOwner>);

    #[async_trait]
    impl OwnerLookup for Holders {
        async fn find_owners(&self, _identity: &str) -> Result<Vec<ExistingOwner>, StoreError> {
            Ok(self.0.clone())
        }
    }

    struct Offline;

    #[async_trait]
    impl OwnerLookup for Offline {
        async fn find_owners(&self, _identity: &str) -> Result<Vec<ExistingOwner>, StoreError> {
            Err(StoreError::Unavailable("database is down".to_string()))
        }
    }

    /// Rule with a fixed verdict that counts its calls
    struct Fixed {
        name: &'static str,
        verdict: RuleVerdict,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn counting(name: &'static str, verdict: RuleVerdict) -> (Arc<dyn IdentityRule>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let rule: Arc<dyn IdentityRule> =
                Arc::new(Fixed { name, verdict, calls: Arc::clone(&calls) });
            (rule, calls)
        }
    }

    #[async_trait]
    impl IdentityRule for Fixed {
        async fn validate(&self, _identity: &str) -> Result<RuleVerdict, RuleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.verdict.clone())
        }

        fn name(&self) -> &str {
            self.name
        }

        fn rule_type(&self) -> RuleType {
            RuleType::Builtin
        }
    }

    struct Broken;

    #[async_trait]
    impl IdentityRule for Broken {
        async fn validate(&self, _identity: &str) -> Result<RuleVerdict, RuleError> {
            Err(RuleError::Script("boom".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }

        fn rule_type(&self) -> RuleType {
            RuleType::Script
        }
    }

    async fn check(
        identity: &str,
        owner: Option<u64>,
        config: &ValidationConfig,
        lookup: &dyn OwnerLookup,
    ) -> ValidationOutcome {
        ValidationEngine::evaluate(identity, owner.map(OwnerRef), config, lookup, &ValidatorRegistry::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_required_rejects_blank() {
        let config = ValidationConfig::default().with_required(true);
        for blank in ["", "   ", "\t\n"] {
            assert_eq!(
                check(blank, Some(1), &config, &Holders(vec![])).await,
                ValidationOutcome::invalid(REASON_REQUIRED)
            );
        }
        assert!(check("x", None, &config, &Holders(vec![])).await.is_valid());
    }

    #[tokio::test]
    async fn test_everything_off_accepts_empty() {
        let config = ValidationConfig::default();
        assert_eq!(check("", None, &config, &Offline).await, ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn test_pattern_match_decides() {
        let config = ValidationConfig::default().with_pattern(r"^\d{7,8}-[\dK]$");
        assert!(check("12345678-5", None, &config, &Holders(vec![])).await.is_valid());
        assert_eq!(
            check("12.345.678-5", None, &config, &Holders(vec![])).await,
            ValidationOutcome::invalid(REASON_FORMAT)
        );
    }

    #[tokio::test]
    async fn test_required_checked_before_pattern() {
        let config = ValidationConfig::default().with_required(true).with_pattern(r"^\d+$");
        assert_eq!(
            check("", None, &config, &Holders(vec![])).await,
            ValidationOutcome::invalid(REASON_REQUIRED)
        );
    }

    #[tokio::test]
    async fn test_uncompilable_pattern_fails_closed() {
        let config = ValidationConfig::default().with_pattern("([0-9]+");
        assert_eq!(
            check("123", None, &config, &Holders(vec![])).await,
            ValidationOutcome::invalid(REASON_FORMAT)
        );
    }

    #[tokio::test]
    async fn test_exempt_and_own_holders_never_conflict() {
        let config = ValidationConfig::default().with_uniqueness(true);

        let guests = Holders(vec![
            ExistingOwner::new(OwnerRef(4), true),
            ExistingOwner::new(OwnerRef(5), true),
            ExistingOwner::new(OwnerRef(6), true),
        ]);
        assert!(check("v", None, &config, &guests).await.is_valid());
        assert!(check("v", Some(9), &config, &guests).await.is_valid());

        let self_only = Holders(vec![ExistingOwner::new(OwnerRef(9), false)]);
        assert!(check("v", Some(9), &config, &self_only).await.is_valid());

        let mixed = Holders(vec![ExistingOwner::new(OwnerRef(4), true), ExistingOwner::new(OwnerRef(9), false)]);
        assert!(check("v", Some(9), &config, &mixed).await.is_valid());
    }

    #[tokio::test]
    async fn test_foreign_holder_conflicts() {
        let config = ValidationConfig::default().with_uniqueness(true);

        let holders = Holders(vec![
            ExistingOwner::new(OwnerRef(4), true),
            ExistingOwner::new(OwnerRef(9), false),
            ExistingOwner::new(OwnerRef(12), false),
        ]);
        assert_eq!(
            check("v", Some(9), &config, &holders).await,
            ValidationOutcome::invalid(REASON_TAKEN)
        );

        // A new owner conflicts with any durable holder
        let one = Holders(vec![ExistingOwner::new(OwnerRef(9), false)]);
        assert_eq!(
            check("v", None, &config, &one).await,
            ValidationOutcome::invalid(REASON_TAKEN)
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_is_an_error() {
        let config = ValidationConfig::default().with_uniqueness(true);
        let result =
            ValidationEngine::evaluate("v", None, &config, &Offline, &ValidatorRegistry::new()).await;
        assert!(matches!(result, Err(EngineError::Lookup(StoreError::Unavailable(_)))));
    }

    #[tokio::test]
    async fn test_lookup_skipped_when_uniqueness_off() {
        let config = ValidationConfig::default();
        assert!(check("v", None, &config, &Offline).await.is_valid());
    }

    #[tokio::test]
    async fn test_first_failing_rule_wins_and_stops_chain() {
        let (a, a_calls) = Fixed::counting("a_pass", RuleVerdict::Pass);
        let (b, b_calls) = Fixed::counting("b_fail", RuleVerdict::fail("Rule B says no."));
        let (c, c_calls) = Fixed::counting("c_fail", RuleVerdict::fail("Rule C says no."));
        // Registration order differs from name order on purpose
        let registry = ValidatorRegistry::from_rules(vec![c, a, b]);

        let config = ValidationConfig::default().with_extensions(true);
        let outcome = ValidationEngine::evaluate("v", None, &config, &Holders(vec![]), &registry)
            .await
            .unwrap();

        assert_eq!(outcome, ValidationOutcome::invalid("Rule B says no."));
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rules_skipped_when_extensions_off() {
        let (rule, calls) = Fixed::counting("deny", RuleVerdict::fail("No."));
        let registry = ValidatorRegistry::from_rules(vec![rule]);

        let outcome = ValidationEngine::evaluate(
            "v",
            None,
            &ValidationConfig::default(),
            &Holders(vec![]),
            &registry,
        )
        .await
        .unwrap();

        assert!(outcome.is_valid());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rules_not_run_after_core_failure() {
        let (rule, calls) = Fixed::counting("deny", RuleVerdict::fail("No."));
        let registry = ValidatorRegistry::from_rules(vec![rule]);
        let config = ValidationConfig::default().with_extensions(true).with_uniqueness(true);

        let outcome = ValidationEngine::evaluate(
            "v",
            None,
            &config,
            &Holders(vec![ExistingOwner::new(OwnerRef(1), false)]),
            &registry,
        )
        .await
        .unwrap();

        assert_eq!(outcome, ValidationOutcome::invalid(REASON_TAKEN));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_chain_passes() {
        let config = ValidationConfig::default().with_extensions(true);
        assert!(check("v", None, &config, &Holders(vec![])).await.is_valid());
    }

    #[tokio::test]
    async fn test_rule_error_propagates() {
        let registry = ValidatorRegistry::from_rules(vec![Arc::new(Broken) as Arc<dyn IdentityRule>]);
        let config = ValidationConfig::default().with_extensions(true);

        let result = ValidationEngine::evaluate("v", None, &config, &Holders(vec![]), &registry).await;
        match result {
            Err(EngineError::Rule { rule, .. }) => assert_eq!(rule, "broken"),
            other => panic!("expected rule error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_engine_reads_settings_per_call_and_commits() {
        let settings = Arc::new(SharedSettings::new());
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(RuleCatalog::from_registry(ValidatorRegistry::from_rules(vec![
            builtin::lookup("rut").unwrap(),
        ])));
        let engine = ValidationEngine::new(settings.clone(), store.clone(), catalog);

        // Nothing enabled yet: a bad RUT passes
        assert!(engine.validate("12.345.678-4", None).await.unwrap().is_valid());

        settings.set(keys::USE_EXTENSIONS, true);
        settings.set(keys::ENFORCE_UNIQUENESS, true);
        assert_eq!(
            engine.validate("12.345.678-4", None).await.unwrap(),
            ValidationOutcome::invalid("The RUT check digit does not match.")
        );

        // Stage during creation, commit once the owner exists
        let pending = match engine.stage("12.345.678-5", None).await.unwrap() {
            Staged::Accepted(pending) => pending,
            Staged::Rejected { reason } => panic!("rejected: {}", reason),
        };
        assert_eq!(pending.validated_for(), None);
        pending.commit(OwnerRef(10), false, store.as_ref()).await.unwrap();
        assert_eq!(
            store.identity_of(OwnerRef(10)).await.unwrap().as_deref(),
            Some("12.345.678-5")
        );

        // Same value is now taken for others, but fine for its holder
        assert_eq!(
            engine.stage("12.345.678-5", Some(OwnerRef(11))).await.unwrap(),
            Staged::Rejected { reason: REASON_TAKEN.to_string() }
        );
        assert!(engine.validate("12.345.678-5", Some(OwnerRef(10))).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_pattern_change_applies_to_next_call() {
        let settings = Arc::new(SharedSettings::new());
        let catalog = Arc::new(RuleCatalog::from_registry(ValidatorRegistry::new()));
        let engine = ValidationEngine::new(settings.clone(), Arc::new(MemoryStore::new()), catalog);

        settings.set(keys::PATTERN, r"^\d+$");
        assert!(engine.validate("123", None).await.unwrap().is_valid());
        assert!(engine.validate("123", None).await.unwrap().is_valid());

        settings.set(keys::PATTERN, "/^[a-z]+$/i");
        assert_eq!(
            engine.validate("123", None).await.unwrap(),
            ValidationOutcome::invalid(REASON_FORMAT)
        );
        assert!(engine.validate("Abc", None).await.unwrap().is_valid());

        settings.set(keys::PATTERN, "([0-9]+");
        assert_eq!(
            engine.validate("123", None).await.unwrap(),
            ValidationOutcome::invalid(REASON_FORMAT)
        );
    }
}
