//! Migration steps
//!
//! A step is a small, idempotent rewrite of the configuration tree. Most
//! schema changes are "this key moved", which `MoveValue` expresses
//! declaratively; anything else can be written as an `FnStep`.

use std::fmt;

use tracing::warn;

use crate::error::{MigrationError, Result};
use crate::tree::ConfigTree;
use crate::value::{KeyPath, ValueKind};

/// Why a step did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The source namespace is not present in the tree
    MissingNamespace,
    /// The namespace exists but the source key does not
    MissingSource,
}

/// Result of applying one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The destination was written
    Applied,
    /// The destination already held a value; only source cleanup ran
    AlreadyMigrated,
    /// Nothing to do
    Skipped(SkipReason),
}

impl StepOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn is_skipped(self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// A single versioned rewrite rule.
///
/// Implementations must be idempotent: a second application on an already
/// migrated tree must leave it unchanged. An absent source is never an
/// error.
pub trait MigrationStep: Send + Sync {
    /// Short description used in logs and errors
    fn name(&self) -> &str;

    /// Rewrite the tree in place
    fn apply(&self, tree: &mut ConfigTree) -> Result<StepOutcome>;
}

/// A namespace plus a path inside it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub namespace: String,
    pub path: KeyPath,
}

impl Location {
    /// Build a location from a namespace and a dotted path
    pub fn new(namespace: impl Into<String>, path: &str) -> Result<Self> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(MigrationError::invalid_path(format!("/{}", path)));
        }
        Ok(Self {
            namespace,
            path: KeyPath::parse(path)?,
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.path)
    }
}

/// Move (or copy) one value to a new location, checking its shape.
#[derive(Debug, Clone)]
pub struct MoveValue {
    name: String,
    from: Location,
    to: Location,
    expect: ValueKind,
    remove_source: bool,
    prune_empty: bool,
}

impl MoveValue {
    /// Create a move that removes the source and prunes emptied parents
    pub fn new(from: Location, to: Location, expect: ValueKind) -> Self {
        let name = format!("move {} -> {}", from, to);
        Self {
            name,
            from,
            to,
            expect,
            remove_source: true,
            prune_empty: true,
        }
    }

    /// Override the generated step name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Copy instead of move: leave the source key in place
    pub fn keep_source(mut self) -> Self {
        self.remove_source = false;
        self
    }

    /// Leave emptied parent mappings behind after removing the source
    pub fn keep_empty_parents(mut self) -> Self {
        self.prune_empty = false;
        self
    }

    pub fn source(&self) -> &Location {
        &self.from
    }

    pub fn destination(&self) -> &Location {
        &self.to
    }

    pub fn expect(&self) -> ValueKind {
        self.expect
    }
}

impl MigrationStep for MoveValue {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, tree: &mut ConfigTree) -> Result<StepOutcome> {
        if !tree.contains_namespace(&self.from.namespace) {
            return Ok(StepOutcome::Skipped(SkipReason::MissingNamespace));
        }

        let Some(source) = tree.get(&self.from.namespace, &self.from.path)? else {
            return Ok(StepOutcome::Skipped(SkipReason::MissingSource));
        };

        if !self.expect.accepts(source.kind()) {
            return Err(MigrationError::structural(
                self.from.to_string(),
                self.expect,
                source.kind(),
            ));
        }

        if self.from == self.to {
            return Ok(StepOutcome::AlreadyMigrated);
        }

        let source = source.clone();
        let outcome = match tree.get(&self.to.namespace, &self.to.path)? {
            None => {
                tree.set(&self.to.namespace, &self.to.path, source)?;
                StepOutcome::Applied
            }
            Some(existing) if *existing == source => StepOutcome::AlreadyMigrated,
            Some(_) => {
                warn!(
                    from = %self.from,
                    to = %self.to,
                    "Destination already set to a different value, keeping destination"
                );
                StepOutcome::AlreadyMigrated
            }
        };

        if self.remove_source {
            tree.remove(&self.from.namespace, &self.from.path, self.prune_empty)?;
        }

        Ok(outcome)
    }
}

/// A step backed by a closure, for rewrites that are not a single move
pub struct FnStep<F> {
    name: String,
    func: F,
}

impl<F> FnStep<F>
where
    F: Fn(&mut ConfigTree) -> Result<StepOutcome> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}

impl<F> MigrationStep for FnStep<F>
where
    F: Fn(&mut ConfigTree) -> Result<StepOutcome> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, tree: &mut ConfigTree) -> Result<StepOutcome> {
        (self.func)(tree)
    }
}
