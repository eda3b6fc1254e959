//! Plugin configuration migration library
//!
//! Rewrites a host's per-plugin configuration tree from the schema version
//! it was written for up to a newer one, so existing configuration files
//! keep working as settings move between plugins.

pub mod cli;
pub mod config_file;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod registry;
pub mod step;
pub mod tree;
pub mod value;

// Re-export main types for convenience
pub use config_file::{ConfigDocument, ConfigFormat};
pub use engine::{LEGACY_VERSION, MigrationContext, MigrationReport, StepRecord, migrate};
pub use error::{MigrationError, Result};
pub use registry::{MigrationRegistry, StepsBetween};
pub use step::{FnStep, Location, MigrationStep, MoveValue, SkipReason, StepOutcome};
pub use tree::ConfigTree;
pub use value::{ConfigMap, ConfigValue, KeyPath, ValueKind};
