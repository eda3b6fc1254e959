//! Property-Based Tests for config-migrate
//!
//! Uses proptest for testing invariants over generated trees and registries.
//!
//! These tests verify:
//! - Migration is idempotent
//! - Trees without the legacy namespace are never modified
//! - `steps_between` stays inside its half-open version range

use proptest::prelude::*;
use std::collections::BTreeMap;

use config_migrate::migrations::{Namespaces, builtin_registry};
use config_migrate::{
    ConfigMap, ConfigTree, ConfigValue, FnStep, MigrationContext, MigrationRegistry, SkipReason,
    StepOutcome, migrate,
};

// =============================================================================
// Generators
// =============================================================================

fn leaf_strategy() -> impl Strategy<Value = ConfigValue> {
    prop_oneof![
        any::<bool>().prop_map(ConfigValue::Bool),
        any::<i64>().prop_map(ConfigValue::Integer),
        "[a-z/:.0-9-]{0,16}".prop_map(ConfigValue::String),
    ]
}

fn value_strategy() -> impl Strategy<Value = ConfigValue> {
    leaf_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(ConfigValue::Sequence),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4).prop_map(ConfigValue::Mapping),
        ]
    })
}

/// Legacy CRI settings: the keys the migration owns, with well-formed values,
/// mixed with arbitrary keys it does not own.
fn cri_strategy() -> impl Strategy<Value = ConfigMap> {
    (
        proptest::option::of("[a-z/:.0-9-]{1,16}"),
        proptest::option::of("/[a-z/]{1,16}"),
        proptest::option::of(any::<bool>()),
        prop::collection::btree_map("x_[a-z]{1,6}", value_strategy(), 0..3),
    )
        .prop_map(|(sandbox, config_path, discard, mut extra)| {
            if let Some(image) = sandbox {
                extra.insert("sandbox_image".into(), image.into());
            }
            if let Some(path) = config_path {
                let mut registry = ConfigMap::new();
                registry.insert("config_path".into(), path.into());
                extra.insert("registry".into(), registry.into());
            }
            if let Some(flag) = discard {
                let mut containerd = ConfigMap::new();
                containerd.insert("discard_unpacked_layers".into(), flag.into());
                extra.insert("containerd".into(), containerd.into());
            }
            extra
        })
}

fn other_namespaces() -> impl Strategy<Value = BTreeMap<String, ConfigValue>> {
    prop::collection::btree_map("plugin\\.[a-z]{1,8}", value_strategy(), 0..3)
}

// =============================================================================
// Migration Properties
// =============================================================================

proptest! {
    /// migrate(migrate(T)) == migrate(T)
    #[test]
    fn migration_is_idempotent(cri in cri_strategy(), others in other_namespaces()) {
        let ns = Namespaces::default();
        let registry = builtin_registry(&ns).unwrap();
        let mut tree = ConfigTree::from(others);
        tree.insert_namespace(ns.legacy_cri.clone(), cri);

        migrate(&MigrationContext::new(), &registry, 2, &mut tree).unwrap();
        let once = tree.clone();
        migrate(&MigrationContext::new(), &registry, 2, &mut tree).unwrap();

        prop_assert_eq!(tree, once);
    }

    /// Trees that never configured the legacy plugin come out unchanged
    #[test]
    fn absent_legacy_namespace_is_noop(others in other_namespaces()) {
        let registry = builtin_registry(&Namespaces::default()).unwrap();
        let original = ConfigTree::from(others);
        let mut tree = original.clone();

        let report = migrate(&MigrationContext::new(), &registry, 2, &mut tree).unwrap();

        prop_assert!(report.is_noop());
        prop_assert_eq!(tree, original);
    }
}

// =============================================================================
// Registry Properties
// =============================================================================

fn registry_from(versions: &[u32]) -> MigrationRegistry {
    let mut registry = MigrationRegistry::new();
    for (i, version) in versions.iter().enumerate() {
        let step = FnStep::new(format!("step-{}", i), |_: &mut ConfigTree| {
            Ok(StepOutcome::Skipped(SkipReason::MissingSource))
        });
        registry.register(*version, step).unwrap();
    }
    registry
}

proptest! {
    /// Every yielded step lies in (from, to], in non-decreasing version order
    #[test]
    fn steps_between_respects_range(
        versions in prop::collection::vec(2u32..10, 0..12),
        from in 0u32..11,
        to in 0u32..11,
    ) {
        let registry = registry_from(&versions);
        let yielded: Vec<u32> = registry.steps_between(from, to).map(|(v, _)| v).collect();

        for v in &yielded {
            prop_assert!(*v > from && *v <= to);
        }
        prop_assert!(yielded.windows(2).all(|w| w[0] <= w[1]));

        let expected = versions.iter().filter(|v| **v > from && **v <= to).count();
        prop_assert_eq!(yielded.len(), expected);
    }

    /// Steps sharing a version come out in registration order
    #[test]
    fn steps_within_version_keep_insertion_order(count in 1usize..6) {
        let registry = registry_from(&vec![2; count]);
        let names: Vec<String> = registry
            .steps_between(1, 2)
            .map(|(_, s)| s.name().to_string())
            .collect();

        let expected: Vec<String> = (0..count).map(|i| format!("step-{}", i)).collect();
        prop_assert_eq!(names, expected);
    }
}
