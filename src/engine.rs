//! Migration engine
//!
//! Brings a configuration tree from the version it was authored against up
//! to a target schema version by applying every registered step in
//! `(current, target]`, in version order.
//!
//! # Guarantees
//!
//! - **Forward only**: a tree already at or past the target is left alone
//! - **Idempotent**: running the same migration twice changes nothing the
//!   second time
//! - **Fail fast**: the first failing step aborts the whole call. Steps that
//!   ran before it are not rolled back.
//!
//! # Example
//!
//! ```
//! use config_migrate::{migrate, ConfigTree, MigrationContext};
//! use config_migrate::migrations::{builtin_registry, Namespaces};
//! use serde_json::json;
//!
//! let registry = builtin_registry(&Namespaces::default()).unwrap();
//! let mut tree = ConfigTree::try_from(json!({
//!     "io.containerd.grpc.v1.cri": { "sandbox_image": "registry.k8s.io/pause:3.9" }
//! })).unwrap();
//!
//! let report = migrate(&MigrationContext::new(), &registry, 2, &mut tree).unwrap();
//! assert_eq!(report.applied(), 1);
//! ```

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{MigrationError, Result};
use crate::registry::MigrationRegistry;
use crate::step::StepOutcome;
use crate::tree::ConfigTree;

/// Oldest supported schema version; trees with no recorded version are
/// assumed to be at this version.
pub const LEGACY_VERSION: u32 = 1;

/// Per-call options for a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationContext {
    current_version: u32,
    deadline: Option<Instant>,
}

impl Default for MigrationContext {
    fn default() -> Self {
        Self {
            current_version: LEGACY_VERSION,
            deadline: None,
        }
    }
}

impl MigrationContext {
    /// Context for a legacy tree with no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Version the tree was authored against
    pub fn with_current_version(mut self, version: u32) -> Self {
        self.current_version = version;
        self
    }

    /// Stop before starting another step once `deadline` has passed
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// What happened to one step during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub version: u32,
    pub step: String,
    pub outcome: StepOutcome,
}

/// Summary of one migration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    pub steps: Vec<StepRecord>,
}

impl MigrationReport {
    fn empty(from_version: u32, to_version: u32) -> Self {
        Self {
            from_version,
            to_version,
            steps: Vec::new(),
        }
    }

    /// Number of steps that wrote a destination
    pub fn applied(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_applied()).count()
    }

    /// Number of steps that found nothing to do
    pub fn skipped(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_skipped()).count()
    }

    /// True when no step wrote anything
    pub fn is_noop(&self) -> bool {
        self.applied() == 0
    }
}

fn check_version(registry: &MigrationRegistry, version: u32) -> Result<()> {
    let lowest = registry.base_version();
    let highest = registry.latest_version();
    if version < lowest || version > highest {
        return Err(MigrationError::UnknownVersion {
            version,
            lowest,
            highest,
        });
    }
    Ok(())
}

/// Migrate `tree` in place up to `target_version`.
///
/// Steps whose source is absent are skipped silently. Only structural
/// problems, unknown versions and an expired deadline are errors.
pub fn migrate(
    ctx: &MigrationContext,
    registry: &MigrationRegistry,
    target_version: u32,
    tree: &mut ConfigTree,
) -> Result<MigrationReport> {
    let from_version = ctx.current_version();
    check_version(registry, target_version)?;
    if from_version < registry.base_version() {
        return Err(MigrationError::UnknownVersion {
            version: from_version,
            lowest: registry.base_version(),
            highest: registry.latest_version(),
        });
    }

    if from_version >= target_version {
        debug!(from_version, target_version, "Configuration already at target version");
        return Ok(MigrationReport::empty(from_version, target_version));
    }

    info!(from_version, target_version, "Migrating plugin configuration");

    let mut report = MigrationReport::empty(from_version, target_version);
    for (version, step) in registry.steps_between(from_version, target_version) {
        if ctx.deadline_passed() {
            return Err(MigrationError::DeadlineExceeded {
                version,
                step: step.name().to_string(),
            });
        }

        let outcome = step
            .apply(tree)
            .map_err(|source| MigrationError::StepFailed {
                version,
                step: step.name().to_string(),
                source: Box::new(source),
            })?;

        debug!(version, step = step.name(), ?outcome, "Migration step finished");
        report.steps.push(StepRecord {
            version,
            step: step.name().to_string(),
            outcome,
        });
    }

    info!(
        from_version,
        target_version,
        applied = report.applied(),
        skipped = report.skipped(),
        "Plugin configuration migrated"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{FnStep, SkipReason};
    use crate::value::{ConfigValue, KeyPath};
    use serde_json::json;

    fn tree(value: serde_json::Value) -> ConfigTree {
        ConfigTree::try_from(value).unwrap()
    }

    /// Step that renames `ns.from` to `ns.to` when present
    fn rename(ns: &'static str, from: &'static str, to: &'static str) -> impl crate::step::MigrationStep {
        FnStep::new(format!("rename {}", from), move |tree: &mut ConfigTree| {
            let from = KeyPath::parse(from)?;
            let to = KeyPath::parse(to)?;
            match tree.remove(ns, &from, true)? {
                Some(value) => {
                    tree.set(ns, &to, value)?;
                    Ok(StepOutcome::Applied)
                }
                None => Ok(StepOutcome::Skipped(SkipReason::MissingSource)),
            }
        })
    }

    fn chain_registry() -> MigrationRegistry {
        let mut registry = MigrationRegistry::new();
        registry.register(2, rename("p", "a", "b")).unwrap();
        registry.register(3, rename("p", "b", "c")).unwrap();
        registry
    }

    #[test]
    fn test_chain_composes_across_versions() {
        let mut t = tree(json!({ "p": { "a": 1 } }));

        let report = migrate(&MigrationContext::new(), &chain_registry(), 3, &mut t).unwrap();

        assert_eq!(t, tree(json!({ "p": { "c": 1 } })));
        assert_eq!(report.applied(), 2);
        assert_eq!(
            report.steps.iter().map(|s| s.version).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn test_partial_target_stops_early() {
        let mut t = tree(json!({ "p": { "a": 1 } }));

        migrate(&MigrationContext::new(), &chain_registry(), 2, &mut t).unwrap();

        assert_eq!(t, tree(json!({ "p": { "b": 1 } })));
    }

    #[test]
    fn test_current_version_skips_older_steps() {
        let mut t = tree(json!({ "p": { "a": 1, "b": 2 } }));
        let ctx = MigrationContext::new().with_current_version(2);

        let report = migrate(&ctx, &chain_registry(), 3, &mut t).unwrap();

        assert_eq!(report.steps.len(), 1);
        assert_eq!(t, tree(json!({ "p": { "a": 1, "c": 2 } })));
    }

    #[test]
    fn test_already_at_target_is_noop() {
        let mut t = tree(json!({ "p": { "a": 1 } }));
        let ctx = MigrationContext::new().with_current_version(3);

        let report = migrate(&ctx, &chain_registry(), 3, &mut t).unwrap();

        assert!(report.steps.is_empty());
        assert!(report.is_noop());
        assert_eq!(t, tree(json!({ "p": { "a": 1 } })));
    }

    #[test]
    fn test_unknown_target_version() {
        let mut t = ConfigTree::new();
        let ctx = MigrationContext::new();

        let err = migrate(&ctx, &chain_registry(), 4, &mut t).unwrap_err();
        assert_eq!(
            err,
            MigrationError::UnknownVersion {
                version: 4,
                lowest: 1,
                highest: 3
            }
        );

        let err = migrate(&ctx, &chain_registry(), 0, &mut t).unwrap_err();
        assert!(err.is_unknown_version());
    }

    #[test]
    fn test_unknown_current_version() {
        let mut t = ConfigTree::new();
        let ctx = MigrationContext::new().with_current_version(0);

        let err = migrate(&ctx, &chain_registry(), 2, &mut t).unwrap_err();
        assert!(err.is_unknown_version());
    }

    #[test]
    fn test_empty_registry_accepts_legacy_target() {
        let mut t = tree(json!({ "p": {} }));
        let report = migrate(&MigrationContext::new(), &MigrationRegistry::new(), 1, &mut t).unwrap();
        assert!(report.steps.is_empty());
    }

    #[test]
    fn test_failure_wraps_step_and_stops() {
        let mut registry = MigrationRegistry::new();
        registry
            .register(
                2,
                FnStep::new("always fails", |_: &mut ConfigTree| {
                    Err(MigrationError::structural(
                        "p/a",
                        crate::value::ValueKind::String,
                        crate::value::ValueKind::Bool,
                    ))
                }),
            )
            .unwrap();
        registry.register(3, rename("p", "a", "z")).unwrap();

        let mut t = tree(json!({ "p": { "a": true } }));
        let err = migrate(&MigrationContext::new(), &registry, 3, &mut t).unwrap_err();

        assert!(err.is_structural());
        assert!(matches!(err, MigrationError::StepFailed { version: 2, .. }));
        // Version 3 never ran
        assert_eq!(
            t.get("p", &KeyPath::parse("a").unwrap()).unwrap(),
            Some(&ConfigValue::Bool(true))
        );
    }

    #[test]
    fn test_context_builders() {
        let ctx = MigrationContext::new();
        assert_eq!(ctx.current_version(), LEGACY_VERSION);
        assert_eq!(ctx.deadline(), None);

        let deadline = Instant::now() + Duration::from_secs(5);
        let ctx = ctx.with_current_version(2).with_deadline(deadline);
        assert_eq!(ctx.current_version(), 2);
        assert_eq!(ctx.deadline(), Some(deadline));

        let before = Instant::now();
        let ctx = MigrationContext::new().with_timeout(Duration::from_secs(60));
        assert!(ctx.deadline().is_some_and(|d| d >= before + Duration::from_secs(60)));
    }

    #[test]
    fn test_expired_deadline_stops_before_first_step() {
        let mut t = tree(json!({ "p": { "a": 1 } }));
        let ctx = MigrationContext::new().with_deadline(Instant::now());

        let err = migrate(&ctx, &chain_registry(), 3, &mut t).unwrap_err();

        assert!(matches!(err, MigrationError::DeadlineExceeded { version: 2, .. }));
        assert_eq!(t, tree(json!({ "p": { "a": 1 } })));
    }

    #[test]
    fn test_generous_timeout_completes() {
        let mut t = tree(json!({ "p": { "a": 1 } }));
        let ctx = MigrationContext::new().with_timeout(Duration::from_secs(60));

        migrate(&ctx, &chain_registry(), 3, &mut t).unwrap();
        assert_eq!(t, tree(json!({ "p": { "c": 1 } })));
    }
}
