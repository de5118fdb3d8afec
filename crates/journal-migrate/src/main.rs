//! journal-migrate CLI
//!
//! Moves trading-journal records from the document store to the REST API,
//! validates the copies and rolls them back.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use journal_migrate::pipeline::{attach_progress_bar, Scope};
use journal_migrate::report::{
    create_migration_report, create_rollback_report, create_validation_report,
};
use journal_migrate::{MigrationSummary, Pipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "journal-migrate")]
#[command(version)]
#[command(about = "Migrate trading-journal records between stores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", default_value = "journal-migrate.yaml", global = true)]
    config: PathBuf,

    /// Entity types to process (trade, daily-plan, journal-entry, all)
    #[arg(short, long, default_value = "all", global = true)]
    entity: String,

    /// Only process records of this owner
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Write a Markdown report to this file
    #[arg(long, value_name = "FILE", global = true)]
    report: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy source records into the target store
    Migrate {
        /// Write the migration results (JSON) to this file
        #[arg(long, value_name = "FILE")]
        results: Option<PathBuf>,

        /// Batch size override
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Compare a sample of source records with their target copies
    Validate {
        /// Migration results (JSON) to validate against
        #[arg(long, value_name = "FILE")]
        results: Option<PathBuf>,

        /// Records compared per entity type
        #[arg(long)]
        sample_size: Option<usize>,

        /// Seed for a reproducible sample
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Write target records back into the source store
    Rollback {
        /// Migration results (JSON) limiting the records rolled back
        #[arg(long, value_name = "FILE")]
        results: Option<PathBuf>,

        /// Delete target records after writing them back
        #[arg(long)]
        delete_from_target: bool,

        /// Batch size override
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Generate example configuration
    Init {
        /// Source type (document_api, memory)
        #[arg(short, long, default_value = "document_api")]
        source: String,

        /// Output file path
        #[arg(short, long, default_value = "journal-migrate.yaml")]
        output: PathBuf,
    },

    /// Validate configuration file
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Migrate {
            results,
            batch_size,
        } => {
            run_migrate(&cli, results.as_deref(), *batch_size).await?;
        }
        Commands::Validate {
            results,
            sample_size,
            seed,
        } => {
            run_validate(&cli, results.as_deref(), *sample_size, *seed).await?;
        }
        Commands::Rollback {
            results,
            delete_from_target,
            batch_size,
        } => {
            run_rollback(&cli, results.as_deref(), *delete_from_target, *batch_size).await?;
        }
        Commands::Init { source, output } => {
            generate_config(source, output)?;
        }
        Commands::Check => {
            check_config(&cli.config)?;
        }
    }

    Ok(())
}

fn load_pipeline(cli: &Cli, batch_size: Option<usize>) -> anyhow::Result<(Pipeline, Scope)> {
    info!("Loading configuration from {:?}", cli.config);

    let mut config = PipelineConfig::from_file(&cli.config)?;
    if let Some(owner) = &cli.owner {
        config.options.owner_id = Some(owner.clone());
    }
    if let Some(bs) = batch_size {
        config.options.batch_size = bs;
    }

    let scope: Scope = cli.entity.parse()?;
    Ok((Pipeline::new(config)?, scope))
}

fn read_results(path: Option<&Path>) -> anyhow::Result<Option<MigrationSummary>> {
    let Some(path) = path else {
        return Ok(None);
    };
    info!("Reading migration results from {:?}", path);
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

fn write_report(path: Option<&PathBuf>, report: &str) -> anyhow::Result<()> {
    if let Some(path) = path {
        std::fs::write(path, report)?;
        println!("   Report:    {:?}", path);
    }
    Ok(())
}

async fn run_migrate(
    cli: &Cli,
    results: Option<&Path>,
    batch_size: Option<usize>,
) -> anyhow::Result<()> {
    let (pipeline, scope) = load_pipeline(cli, batch_size)?;
    let (bar, listener) = attach_progress_bar(pipeline.tracker());

    let summary = pipeline.migrate(scope, &pipeline.migrate_options()).await;
    listener.unsubscribe();
    bar.finish_and_clear();
    let summary = summary?;

    println!("\nMigration complete");
    println!("   Total:     {}", summary.total());
    println!("   Success:   {}", summary.succeeded());
    println!("   Failed:    {}", summary.failed());

    if let Some(path) = results {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        println!("   Results:   {:?}", path);
    }
    write_report(cli.report.as_ref(), &create_migration_report(&summary))?;

    Ok(())
}

async fn run_validate(
    cli: &Cli,
    results: Option<&Path>,
    sample_size: Option<usize>,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let (pipeline, scope) = load_pipeline(cli, None)?;
    let migration = read_results(results)?;

    let mut options = pipeline.validate_options();
    if let Some(n) = sample_size {
        options.sample_size = n;
    }
    options.seed = seed;

    let (bar, listener) = attach_progress_bar(pipeline.tracker());
    let summary = pipeline
        .validate(scope, &options, migration.as_ref())
        .await;
    listener.unsubscribe();
    bar.finish_and_clear();
    let summary = summary?;

    println!("\nValidation complete");
    println!("   Sampled:   {}", summary.total());
    println!("   Validated: {}", summary.succeeded());
    println!("   Failed:    {}", summary.failed());
    write_report(cli.report.as_ref(), &create_validation_report(&summary))?;

    Ok(())
}

async fn run_rollback(
    cli: &Cli,
    results: Option<&Path>,
    delete_from_target: bool,
    batch_size: Option<usize>,
) -> anyhow::Result<()> {
    let (pipeline, scope) = load_pipeline(cli, batch_size)?;
    let migration = read_results(results)?;

    let mut options = pipeline.rollback_options();
    options.delete_from_target |= delete_from_target;

    let (bar, listener) = attach_progress_bar(pipeline.tracker());
    let summary = pipeline
        .rollback(scope, &options, migration.as_ref())
        .await;
    listener.unsubscribe();
    bar.finish_and_clear();
    let summary = summary?;

    println!("\nRollback complete");
    println!("   Total:     {}", summary.total());
    println!("   Success:   {}", summary.succeeded());
    println!("   Failed:    {}", summary.failed());
    write_report(cli.report.as_ref(), &create_rollback_report(&summary))?;

    Ok(())
}

fn check_config(config_path: &Path) -> anyhow::Result<()> {
    info!("Validating configuration from {:?}", config_path);

    let config = PipelineConfig::from_file(config_path)?;
    config.validate()?;

    println!("Configuration is valid");
    println!("   Source:     {}", source_kind(&config));
    println!("   Target:     {}", target_kind(&config));
    println!("   Batch size: {}", config.options.batch_size);
    println!("   Sample:     {}", config.options.sample_size);

    Ok(())
}

fn source_kind(config: &PipelineConfig) -> &'static str {
    match config.source {
        journal_migrate::config::SourceStoreConfig::DocumentApi(_) => "document_api",
        journal_migrate::config::SourceStoreConfig::Memory(_) => "memory",
    }
}

fn target_kind(config: &PipelineConfig) -> &'static str {
    match config.target {
        journal_migrate::config::TargetStoreConfig::Rest(_) => "rest",
        journal_migrate::config::TargetStoreConfig::Memory(_) => "memory",
    }
}

fn generate_config(source: &str, output: &Path) -> anyhow::Result<()> {
    let template = match source.to_lowercase().as_str() {
        "document_api" | "document-api" => DOCUMENT_API_TEMPLATE,
        "memory" => MEMORY_TEMPLATE,
        _ => {
            error!("Unknown source type: {}", source);
            eprintln!("Supported sources: document_api, memory");
            std::process::exit(1);
        }
    };

    std::fs::write(output, template)?;
    println!("Generated configuration: {:?}", output);
    println!(
        "   Edit the file and run: journal-migrate migrate --config {:?}",
        output
    );

    Ok(())
}

const DOCUMENT_API_TEMPLATE: &str = r#"# journal-migrate: document store -> REST API
source:
  type: document_api
  data_api_url: https://data.mongodb-api.com/app/<app-id>/endpoint/data/v1
  api_key: your-data-api-key
  database: trading_journal
  data_source: mongodb-atlas

target:
  type: rest
  base_url: https://api.example.com/v1
  api_token: your-api-token

options:
  batch_size: 50
  # owner_id: user-123
  item_limit: 100
  sample_size: 20
  store_timeout_secs: 30
  verify_round_trip: true
  delete_from_target: false
  retry:
    max_retries: 3
    initial_delay: 500
    max_delay: 30000
"#;

const MEMORY_TEMPLATE: &str = r#"# journal-migrate: dry run against a JSON export
source:
  type: memory
  seed_file: ./export.json

target:
  type: memory

options:
  batch_size: 50
  sample_size: 20
"#;
