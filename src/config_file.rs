//! Configuration file handling for loading and saving host config documents.
//!
//! A document carries the schema `version` it was written for, the
//! per-plugin `plugins` tree the engine rewrites, and any other top-level
//! settings, which are passed through untouched.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use strum::{Display, EnumString};

use crate::engine::LEGACY_VERSION;
use crate::tree::ConfigTree;
use crate::value::{ConfigMap, ConfigValue};

/// On-disk serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// TOML for `.toml` files, JSON for everything else
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// A host configuration document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigDocument {
    /// Schema version; absent means the legacy format
    pub version: Option<u32>,

    /// Plugin configuration keyed by namespace
    pub plugins: ConfigTree,

    /// Top-level settings outside the plugin tree
    pub extra: ConfigMap,
}

impl ConfigDocument {
    /// Schema version the document was written for
    pub fn schema_version(&self) -> u32 {
        self.version.unwrap_or(LEGACY_VERSION)
    }

    /// Parse a document from a string
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let root = match format {
            ConfigFormat::Json => {
                let json: serde_json::Value =
                    serde_json::from_str(content).context("Failed to parse configuration JSON")?;
                ConfigValue::from(json)
            }
            ConfigFormat::Toml => {
                let table: toml::Table =
                    toml::from_str(content).context("Failed to parse configuration TOML")?;
                ConfigValue::from(toml::Value::Table(table))
            }
        };

        match root {
            ConfigValue::Mapping(map) => Self::from_mapping(map),
            other => bail!("Configuration root must be a mapping, found {}", other.kind()),
        }
    }

    /// Split a top-level mapping into version, plugins and the rest
    pub fn from_mapping(mut map: ConfigMap) -> Result<Self> {
        let version = match map.remove("version") {
            None => None,
            Some(ConfigValue::Integer(v)) => Some(
                u32::try_from(v).with_context(|| format!("Invalid schema version {}", v))?,
            ),
            Some(other) => bail!("`version` must be an integer, found {}", other.kind()),
        };

        let plugins = match map.remove("plugins") {
            None => ConfigTree::new(),
            Some(ConfigValue::Mapping(plugins)) => ConfigTree::from(plugins),
            Some(other) => bail!("`plugins` must be a mapping, found {}", other.kind()),
        };

        Ok(Self {
            version,
            plugins,
            extra: map,
        })
    }

    /// The document as one top-level mapping
    pub fn to_mapping(&self) -> ConfigMap {
        let mut map = self.extra.clone();
        if let Some(version) = self.version {
            map.insert("version".to_string(), ConfigValue::Integer(i64::from(version)));
        }
        if !self.plugins.is_empty() {
            let plugins: ConfigMap = self
                .plugins
                .namespaces()
                .map(|(ns, value)| (ns.to_string(), value.clone()))
                .collect();
            map.insert("plugins".to_string(), ConfigValue::Mapping(plugins));
        }
        map
    }

    /// Serialize the document in the given format
    pub fn to_string_pretty(&self, format: ConfigFormat) -> Result<String> {
        let map = self.to_mapping();
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(&map)
                .context("Failed to serialize configuration to JSON"),
            ConfigFormat::Toml => {
                let mut table = toml::Table::new();
                for (key, value) in &map {
                    table.insert(key.clone(), to_toml(value, key)?);
                }
                toml::to_string_pretty(&table).context("Failed to serialize configuration to TOML")
            }
        }
    }

    /// Load a document, picking the format from the file extension
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {:?}", path))?;

        Self::parse(&content, ConfigFormat::from_path(path))
            .with_context(|| format!("Invalid configuration file {:?}", path))
    }

    /// Save a document, picking the format from the file extension
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_string_pretty(ConfigFormat::from_path(path))?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write configuration to {:?}", path))?;

        Ok(())
    }
}

/// Convert a value for TOML output. `at` is the dotted location, for errors.
fn to_toml(value: &ConfigValue, at: &str) -> Result<toml::Value> {
    let converted = match value {
        ConfigValue::Null => bail!("Cannot write null at `{}` as TOML", at),
        ConfigValue::Unsigned(u) => {
            bail!("Integer {} at `{}` does not fit in a TOML integer", u, at)
        }
        ConfigValue::Bool(b) => toml::Value::Boolean(*b),
        ConfigValue::Integer(i) => toml::Value::Integer(*i),
        ConfigValue::Float(f) => toml::Value::Float(*f),
        ConfigValue::String(s) => toml::Value::String(s.clone()),
        ConfigValue::Datetime(d) => toml::Value::Datetime(d.clone()),
        ConfigValue::Sequence(items) => {
            let mut array = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                array.push(to_toml(item, &format!("{}[{}]", at, i))?);
            }
            toml::Value::Array(array)
        }
        ConfigValue::Mapping(map) => {
            let mut table = toml::Table::new();
            for (key, item) in map {
                table.insert(key.clone(), to_toml(item, &format!("{}.{}", at, key))?);
            }
            toml::Value::Table(table)
        }
    };
    Ok(converted)
}
