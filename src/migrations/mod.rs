//! Built-in schema migrations.
//!
//! Each submodule holds the steps introduced at one schema version.
//! Namespace identifiers come from `Namespaces` so hosts with different
//! plugin ids can reuse the same steps.

pub mod v2;

use crate::error::Result;
use crate::registry::MigrationRegistry;

/// Schema version written by the current release
pub const CURRENT_CONFIG_VERSION: u32 = 2;

/// Id of the CRI service plugin family; the images plugin lives under it
pub const CRI_SERVICE_PLUGIN: &str = "io.containerd.cri.v1";

/// Namespace the legacy all-in-one CRI plugin used
pub const LEGACY_CRI_NAMESPACE: &str = "io.containerd.grpc.v1.cri";

/// Plugin namespaces the built-in steps read from and write to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    /// Legacy CRI plugin namespace (source of version 2 moves)
    pub legacy_cri: String,
    /// Images plugin namespace (`<images-plugin-id>.images`)
    pub images: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            legacy_cri: LEGACY_CRI_NAMESPACE.to_string(),
            images: format!("{}.images", CRI_SERVICE_PLUGIN),
        }
    }
}

impl Namespaces {
    pub fn new(legacy_cri: impl Into<String>, images: impl Into<String>) -> Self {
        Self {
            legacy_cri: legacy_cri.into(),
            images: images.into(),
        }
    }
}

/// Registry holding every built-in step
pub fn builtin_registry(namespaces: &Namespaces) -> Result<MigrationRegistry> {
    let mut registry = MigrationRegistry::new();
    for step in v2::steps(namespaces)? {
        registry.register(v2::VERSION, step)?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_namespaces() {
        let ns = Namespaces::default();
        assert_eq!(ns.legacy_cri, "io.containerd.grpc.v1.cri");
        assert_eq!(ns.images, "io.containerd.cri.v1.images");
    }

    #[test]
    fn test_builtin_registry_reaches_current_version() {
        let registry = builtin_registry(&Namespaces::default()).unwrap();
        assert_eq!(registry.latest_version(), CURRENT_CONFIG_VERSION);
        assert_eq!(
            registry.len(),
            v2::steps(&Namespaces::default()).unwrap().len()
        );
    }
}
