//! config-migrate - Main entry point
//!
//! Loads a host configuration document, migrates its plugin tree to the
//! requested schema version and writes the result.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config_migrate::cli::Cli;
use config_migrate::config_file::{ConfigDocument, ConfigFormat};
use config_migrate::migrations::builtin_registry;
use config_migrate::{MigrationContext, MigrationReport, migrate};

/// Initialize logging; RUST_LOG overrides the command line level
fn init_logger(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn print_report(report: &MigrationReport) {
    println!(
        "# schema {} -> {}: {} applied, {} skipped",
        report.from_version,
        report.to_version,
        report.applied(),
        report.skipped()
    );
    for record in &report.steps {
        println!("#   v{} {}: {:?}", record.version, record.step, record.outcome);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut doc = ConfigDocument::load_from_file(&cli.input)?;
    let from_version = cli.from_version.unwrap_or_else(|| doc.schema_version());
    debug!(input = ?cli.input, from_version, "Configuration loaded");

    let registry = builtin_registry(&cli.namespaces()).context("Invalid built-in migrations")?;

    let mut ctx = MigrationContext::new().with_current_version(from_version);
    if let Some(ms) = cli.timeout_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }

    let report = migrate(&ctx, &registry, cli.target_version, &mut doc.plugins)
        .with_context(|| format!("Failed to migrate {:?}", cli.input))?;
    doc.version = Some(report.to_version.max(from_version));

    if cli.dry_run {
        print_report(&report);
        let format = ConfigFormat::from_path(&cli.input);
        print!("{}", doc.to_string_pretty(format)?);
        return Ok(());
    }

    match &cli.output {
        Some(path) => {
            doc.save_to_file(path)?;
            info!(output = ?path, applied = report.applied(), "Migrated configuration written");
        }
        None => {
            let format = ConfigFormat::from_path(&cli.input);
            println!("{}", doc.to_string_pretty(format)?);
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse_args();
    init_logger(&cli.log_level);

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
