//! Type Registry CLI
//!
//! Loads type archives into an in-memory registry and answers questions
//! about the result.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use open_metadata_types::{
    ExchangeEvent, ExchangePolicy, ExchangeRule, RegistryConfig, TypeArchive, TypeDefSummary, TypeRegistry,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "typedef-registry")]
#[command(about = "Load open metadata type archives and inspect the registry")]
struct Cli {
    /// Configuration file (added on top of the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra archive files or directories to install before running the command
    #[arg(short, long)]
    archive: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install archives and summarise what was installed
    Load {
        /// Archive files or directories
        archives: Vec<PathBuf>,
    },

    /// Print a type definition
    Show {
        name: String,
        /// Print the full definition as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the subtypes of a type
    Subtypes {
        name: String,
        /// Include indirect subtypes
        #[arg(long)]
        all: bool,
    },

    /// Evaluate an exchange rule for one event
    Decide {
        #[arg(long)]
        rule: ExchangeRule,
        /// Selected type names (SELECTED_TYPES / DESELECTED_TYPES)
        #[arg(long)]
        selected: Vec<String>,
        /// Type name of the event
        #[arg(long = "type")]
        type_name: String,
        /// Treat the event as a TypeDef event rather than an instance event
        #[arg(long)]
        typedef_event: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn install(registry: &TypeRegistry, path: &Path, verbose: bool) -> anyhow::Result<bool> {
    let mut clean = true;
    let archives = TypeArchive::load(path).with_context(|| format!("loading {}", path.display()))?;
    for archive in archives {
        let report = archive.install(registry)?;
        clean &= report.is_clean();
        if verbose {
            let marker = if report.is_clean() { "✅" } else { "⚠️ " };
            println!(
                "{} {}: {} attribute types, {} types, {} patches",
                marker,
                report.archive_name,
                report.attribute_types_installed,
                report.type_defs_installed,
                report.patches_applied
            );
            for failure in &report.failures {
                println!("   ❌ {}: {}", failure.name, failure.error);
            }
        }
    }
    Ok(clean)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = RegistryConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let registry = TypeRegistry::with_standard_types(config.registry_settings())?;

    let base = std::env::current_dir()?;
    let mut preload = config.archive_paths(&base);
    preload.extend(cli.archive.iter().cloned());
    for path in &preload {
        install(&registry, path, false)?;
    }

    match cli.command {
        Commands::Load { archives } => {
            if archives.is_empty() && preload.is_empty() {
                bail!("no archives given");
            }
            let mut clean = true;
            for path in &archives {
                clean &= install(&registry, path, true)?;
            }
            println!("\n📦 {} types registered", registry.len());
            for summary in registry.summaries() {
                println!(
                    "  {:<40} {:<18} {}",
                    summary.name,
                    summary.category.to_string(),
                    summary.version
                );
            }
            if !clean {
                bail!("some archive elements were not installed");
            }
        }

        Commands::Show { name, json } => {
            let Some(type_def) = registry.get_by_name(&name) else {
                bail!("unknown type: {}", name);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&type_def)?);
            } else {
                println!("{} ({})", type_def.name, type_def.guid);
                println!("  category:   {}", type_def.category());
                println!("  version:    {}", type_def.version);
                if let Some(super_type) = &type_def.super_type {
                    println!("  supertype:  {}", super_type);
                }
                if let Some(description) = &type_def.description {
                    println!("  {}", description);
                }
                println!("  attributes:");
                for attribute in &type_def.properties_definition {
                    println!(
                        "    {:<30} {:<20} {:?} {:?}",
                        attribute.attribute_name,
                        attribute.attribute_type.name,
                        attribute.cardinality,
                        attribute.attribute_status
                    );
                }
            }
        }

        Commands::Subtypes { name, all } => {
            let Some(type_def) = registry.get_by_name(&name) else {
                bail!("unknown type: {}", name);
            };
            let hierarchy = registry.hierarchy();
            let subtypes = if all {
                hierarchy.descendants(&type_def.guid)
            } else {
                hierarchy.subtypes(&type_def.guid)
            };
            for link in subtypes {
                println!("{}", link);
            }
        }

        Commands::Decide {
            rule,
            selected,
            type_name,
            typedef_event,
        } => {
            let policy = ExchangePolicy::selecting(rule, selected.into_iter().map(TypeDefSummary::named).collect());
            let guid = registry.get_by_name(&type_name).map(|t| t.guid).unwrap_or_default();
            let event = ExchangeEvent {
                type_guid: guid,
                type_name,
                is_type_def_event: typedef_event,
            };
            // No usage tracking is available from the command line
            let decision = policy.decide(&event, &registry, &());
            println!("{}", decision);
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            for (cohort, topics) in config.cohort_topics() {
                println!("# {} topics: {}", cohort, topics.all().join(", "));
            }
        }
    }

    Ok(())
}
