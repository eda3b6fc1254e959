//! Migration registry
//!
//! An ordered catalogue of steps keyed by the schema version that
//! introduced them. Built once at startup and then only read.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use crate::engine::LEGACY_VERSION;
use crate::error::{MigrationError, Result};
use crate::step::MigrationStep;

/// Steps grouped by version, ascending; insertion order within a version
#[derive(Clone, Default)]
pub struct MigrationRegistry {
    versions: BTreeMap<u32, Vec<Arc<dyn MigrationStep>>>,
}

impl fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: BTreeMap<u32, Vec<&str>> = self
            .versions
            .iter()
            .map(|(v, steps)| (*v, steps.iter().map(|s| s.name()).collect()))
            .collect();
        f.debug_struct("MigrationRegistry")
            .field("steps", &steps)
            .finish()
    }
}

impl MigrationRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step introduced at `version`
    pub fn register(&mut self, version: u32, step: impl MigrationStep + 'static) -> Result<()> {
        self.register_arc(version, Arc::new(step))
    }

    /// Register an already shared step
    pub fn register_arc(&mut self, version: u32, step: Arc<dyn MigrationStep>) -> Result<()> {
        if version <= LEGACY_VERSION {
            return Err(MigrationError::InvalidRegistration {
                version,
                reason: format!(
                    "steps must be introduced after the legacy version {}",
                    LEGACY_VERSION
                ),
            });
        }

        self.versions.entry(version).or_default().push(step);
        Ok(())
    }

    /// Steps for versions in `(from, to]`, ascending.
    ///
    /// The returned iterator is `Clone`, so it can be restarted. An empty
    /// or inverted range yields nothing.
    pub fn steps_between(&self, from: u32, to: u32) -> StepsBetween<'_> {
        let versions = if from < to {
            self.versions
                .range((Bound::Excluded(from), Bound::Included(to)))
        } else {
            self.versions.range(0..0)
        };

        StepsBetween {
            versions,
            current: None,
        }
    }

    /// Registered versions, ascending
    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.versions.keys().copied()
    }

    /// The version every tree is assumed to start from
    pub fn base_version(&self) -> u32 {
        LEGACY_VERSION
    }

    /// Highest registered version, or the base version when empty
    pub fn latest_version(&self) -> u32 {
        self.versions
            .keys()
            .next_back()
            .copied()
            .unwrap_or(LEGACY_VERSION)
    }

    /// Total number of registered steps
    pub fn len(&self) -> usize {
        self.versions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Lazy iterator over `(version, step)` pairs
#[derive(Clone)]
pub struct StepsBetween<'a> {
    versions: btree_map::Range<'a, u32, Vec<Arc<dyn MigrationStep>>>,
    current: Option<(u32, std::slice::Iter<'a, Arc<dyn MigrationStep>>)>,
}

impl<'a> Iterator for StepsBetween<'a> {
    type Item = (u32, &'a dyn MigrationStep);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((version, steps)) = &mut self.current {
                if let Some(step) = steps.next() {
                    return Some((*version, step.as_ref()));
                }
            }

            let (version, steps) = self.versions.next()?;
            self.current = Some((*version, steps.iter()));
        }
    }
}
