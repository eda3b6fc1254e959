use clap::Parser;
use std::path::PathBuf;

use crate::migrations::{CURRENT_CONFIG_VERSION, Namespaces};

/// config-migrate - upgrade a plugin configuration file to a newer schema
#[derive(Parser, Debug)]
#[command(name = "config-migrate")]
#[command(about = "Migrate plugin configuration to a newer schema version")]
#[command(version)]
pub struct Cli {
    /// Configuration file to migrate (.toml or .json)
    pub input: PathBuf,

    /// Write the migrated document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Schema version to migrate to
    #[arg(short, long, default_value_t = CURRENT_CONFIG_VERSION)]
    pub target_version: u32,

    /// Treat the input as this version, overriding its `version` field
    #[arg(long)]
    pub from_version: Option<u32>,

    /// Namespace of the legacy CRI plugin
    #[arg(long, default_value_t = Namespaces::default().legacy_cri)]
    pub legacy_namespace: String,

    /// Namespace of the images plugin
    #[arg(long, default_value_t = Namespaces::default().images)]
    pub images_namespace: String,

    /// Abort if migration has not finished within this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Print the report and the migrated document without writing files
    #[arg(long)]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn namespaces(&self) -> Namespaces {
        Namespaces::new(self.legacy_namespace.clone(), self.images_namespace.clone())
    }
}
