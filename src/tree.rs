//! Configuration tree keyed by plugin namespace
//!
//! The tree is the unit the engine rewrites. Namespaces are opaque strings;
//! path helpers here never interpret a plugin's settings, they only walk
//! mappings and report shape mismatches.

use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, Result};
use crate::value::{ConfigMap, ConfigValue, KeyPath, ValueKind};

/// Mapping from plugin namespace to that plugin's configuration subtree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree {
    namespaces: ConfigMap,
}

/// Human-readable location used in structural errors (`ns/a.b`)
fn location(namespace: &str, path: &str) -> String {
    if path.is_empty() {
        namespace.to_string()
    } else {
        format!("{}/{}", namespace, path)
    }
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(&self, namespace: &str) -> Option<&ConfigValue> {
        self.namespaces.get(namespace)
    }

    pub fn namespace_mut(&mut self, namespace: &str) -> Option<&mut ConfigValue> {
        self.namespaces.get_mut(namespace)
    }

    pub fn contains_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Insert a namespace, returning the previous subtree if any
    pub fn insert_namespace(
        &mut self,
        namespace: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> Option<ConfigValue> {
        self.namespaces.insert(namespace.into(), value.into())
    }

    pub fn remove_namespace(&mut self, namespace: &str) -> Option<ConfigValue> {
        self.namespaces.remove(namespace)
    }

    /// Iterate namespaces in key order
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.namespaces.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Look up a value.
    ///
    /// Returns `Ok(None)` when the namespace or any segment is absent, and a
    /// structural error when something on the way is not a mapping.
    pub fn get(&self, namespace: &str, path: &KeyPath) -> Result<Option<&ConfigValue>> {
        let Some(mut current) = self.namespaces.get(namespace) else {
            return Ok(None);
        };

        for (depth, segment) in path.segments().iter().enumerate() {
            let map = current.as_mapping().ok_or_else(|| {
                MigrationError::structural(
                    location(namespace, &path.prefix(depth)),
                    ValueKind::Mapping,
                    current.kind(),
                )
            })?;
            match map.get(segment) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }

        Ok(Some(current))
    }

    /// Write a value, creating the namespace and intermediate mappings.
    pub fn set(&mut self, namespace: &str, path: &KeyPath, value: ConfigValue) -> Result<()> {
        let root = self
            .namespaces
            .entry(namespace.to_string())
            .or_insert_with(ConfigValue::mapping);

        let parent = descend_or_create(root, namespace, path)?;
        parent.insert(path.leaf().to_string(), value);
        Ok(())
    }

    /// Remove a value, returning it if it was present.
    ///
    /// With `prune_empty`, mappings left empty by the removal are removed
    /// as well, walking up towards the namespace. The namespace entry itself
    /// is always kept.
    pub fn remove(
        &mut self,
        namespace: &str,
        path: &KeyPath,
        prune_empty: bool,
    ) -> Result<Option<ConfigValue>> {
        let Some(root) = self.namespaces.get_mut(namespace) else {
            return Ok(None);
        };
        remove_at(root, namespace, path, 0, prune_empty)
    }
}

impl From<ConfigMap> for ConfigTree {
    fn from(namespaces: ConfigMap) -> Self {
        Self { namespaces }
    }
}

impl TryFrom<serde_json::Value> for ConfigTree {
    type Error = MigrationError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match ConfigValue::from(value) {
            ConfigValue::Mapping(namespaces) => Ok(Self { namespaces }),
            other => Err(MigrationError::structural("<root>", ValueKind::Mapping, other.kind())),
        }
    }
}

/// Walk to the mapping that should hold `path.leaf()`, creating missing
/// mappings along the way.
fn descend_or_create<'a>(
    root: &'a mut ConfigValue,
    namespace: &str,
    path: &KeyPath,
) -> Result<&'a mut ConfigMap> {
    let mut current = root;

    for (depth, segment) in path.parents().iter().enumerate() {
        let found = current.kind();
        let map = current.as_mapping_mut().ok_or_else(|| {
            MigrationError::structural(
                location(namespace, &path.prefix(depth)),
                ValueKind::Mapping,
                found,
            )
        })?;
        current = map
            .entry(segment.clone())
            .or_insert_with(ConfigValue::mapping);
    }

    let found = current.kind();
    current.as_mapping_mut().ok_or_else(|| {
        MigrationError::structural(
            location(namespace, &path.prefix(path.parents().len())),
            ValueKind::Mapping,
            found,
        )
    })
}

fn remove_at(
    node: &mut ConfigValue,
    namespace: &str,
    path: &KeyPath,
    depth: usize,
    prune_empty: bool,
) -> Result<Option<ConfigValue>> {
    let found = node.kind();
    let map = node.as_mapping_mut().ok_or_else(|| {
        MigrationError::structural(
            location(namespace, &path.prefix(depth)),
            ValueKind::Mapping,
            found,
        )
    })?;

    let segment = &path.segments()[depth];
    if depth + 1 == path.segments().len() {
        return Ok(map.remove(segment));
    }

    let Some(child) = map.get_mut(segment) else {
        return Ok(None);
    };
    let removed = remove_at(child, namespace, path, depth + 1, prune_empty)?;

    if prune_empty && removed.is_some() {
        let empty = child.as_mapping().is_some_and(ConfigMap::is_empty);
        if empty {
            map.remove(segment);
        }
    }

    Ok(removed)
}
