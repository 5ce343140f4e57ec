//! LWF model promotion CLI
//!
//! The `lwf-promote` command drives champion/challenger promotion of station
//! models against the SurrealDB model registry.
//!
//! ## Commands
//!
//! - `promote`: Promote a batch of trained entities from one parent run
//! - `record-run`: Log a training run with its metrics
//! - `show`: Show aliases and version lineage of one entity

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use model_registry::{
    Alias, ArtifactRef, MetricSet, ModelVersion, NewRun, RegistryClient, SurrealHandle,
    SurrealModelRegistry,
};
use promotion_core::{
    BatchRun, PromotionConfig, PromotionCoordinator, PromotionReport, TrainedEntity,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn, Instrument, Level};

#[derive(Parser)]
#[command(name = "lwf-promote")]
#[command(author = "LWF Engineering")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Champion/challenger promotion for LWF station models", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Promotion config file (TOML); `LWF_*` variables override it
    #[arg(short, long, global = true, env = "LWF_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Promote every entity of a trained batch
    Promote {
        /// JSON array of `{"entity_id", "artifact_ref"}` objects, in processing order
        #[arg(short, long)]
        batch: PathBuf,

        /// Parent run the batch was trained under
        #[arg(short, long)]
        parent_run: String,

        /// Override `max_concurrency` from the config
        #[arg(long)]
        max_concurrency: Option<usize>,
    },

    /// Record a training run for an entity
    RecordRun {
        /// Parent run id
        #[arg(short, long)]
        parent_run: String,

        /// Entity (station) id
        #[arg(short, long)]
        entity: String,

        /// Metric as NAME=VALUE, repeatable
        #[arg(short, long = "metric")]
        metrics: Vec<String>,
    },

    /// Show champion, challenger and versions of an entity
    Show {
        /// Entity (station) id
        entity: String,

        /// Maximum number of versions to list
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    promotion_core::init_tracing(cli.json, level);

    let config = PromotionConfig::load(cli.config.as_deref()).context("invalid configuration")?;

    let span = promotion_core::service_span(&config);
    run(cli.command, config).instrument(span).await
}

async fn run(command: Commands, config: PromotionConfig) -> Result<()> {
    let registry = connect_registry(&config).await?;

    match command {
        Commands::Promote {
            batch,
            parent_run,
            max_concurrency,
        } => {
            let mut config = config;
            if let Some(n) = max_concurrency {
                config.max_concurrency = n;
                config.validate()?;
            }
            let report = cmd_promote(registry, config, &batch, &parent_run).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::RecordRun {
            parent_run,
            entity,
            metrics,
        } => cmd_record_run(registry.as_ref(), &parent_run, &entity, &metrics).await,
        Commands::Show { entity, limit } => {
            let view = cmd_show(registry.as_ref(), &entity, limit).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
    }
}

/// Open the registry: SurrealDB Cloud when `SURREALDB_*` is set, otherwise
/// `tracking_uri`, in the `{stack}_{environment}` namespace and the
/// experiment's database.
async fn connect_registry(config: &PromotionConfig) -> Result<Arc<dyn RegistryClient>> {
    let handle = SurrealHandle::setup_from_env(
        &config.registry_namespace(),
        &config.experiment_name,
        &config.tracking_uri,
    )
    .await
    .with_context(|| format!("Failed to connect to model registry at {}", config.tracking_uri))?;
    Ok(Arc::new(SurrealModelRegistry::new(Arc::new(handle))))
}

/// Read a batch file: a JSON array of trained entities.
fn load_batch(path: &Path) -> Result<Vec<TrainedEntity>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read batch file {}", path.display()))?;
    let batch: Vec<TrainedEntity> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of entities", path.display()))?;
    Ok(batch)
}

/// Parse `NAME=VALUE` pairs into a metric set.
fn parse_metrics(pairs: &[String]) -> Result<MetricSet> {
    let mut metrics = MetricSet::new();
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("metric {pair:?} is not NAME=VALUE");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("metric {pair:?} has an empty name");
        }
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("metric {name} has a non-numeric value"))?;
        metrics.insert(name, value);
    }
    Ok(metrics)
}

async fn cmd_promote(
    registry: Arc<dyn RegistryClient>,
    config: PromotionConfig,
    batch_path: &Path,
    parent_run: &str,
) -> Result<PromotionReport> {
    let batch = load_batch(batch_path)?;
    let coordinator = PromotionCoordinator::new(registry, config);

    // Ctrl-C stops entities that have not started yet.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, skipping entities not yet started");
            cancel_tx.send_replace(true);
        }
    });

    let result = coordinator
        .promote_with_cancel(&batch, &BatchRun::new(parent_run), cancel_rx)
        .await;
    ctrl_c.abort();

    let report = result.context("promotion failed")?;
    info!(
        promoted = report.promoted(),
        rejected = report.rejected(),
        skipped = report.skipped(),
        "promotion complete"
    );
    promotion_core::METRICS.flush();
    Ok(report)
}

async fn cmd_record_run(
    registry: &dyn RegistryClient,
    parent_run: &str,
    entity: &str,
    metrics: &[String],
) -> Result<()> {
    let run = registry
        .record_run(NewRun {
            parent_run_id: parent_run.to_string(),
            entity_id: entity.to_string(),
            metrics: parse_metrics(metrics)?,
        })
        .await
        .context("failed to record run")?;

    println!("Recorded run {} for {}", run.run_id, run.entity_id);
    println!("  artifact: {}", ArtifactRef::for_run(&run.run_id, "model"));
    Ok(())
}

#[derive(Debug, Serialize)]
struct EntityView {
    entity: String,
    champion: Option<u64>,
    challenger: Option<u64>,
    versions: Vec<ModelVersion>,
}

async fn cmd_show(registry: &dyn RegistryClient, entity: &str, limit: usize) -> Result<EntityView> {
    let champion = registry.get_version_by_alias(entity, Alias::Champion).await?;
    let challenger = registry
        .get_version_by_alias(entity, Alias::Challenger)
        .await?;
    let mut versions = registry.list_versions(entity).await?;
    versions.truncate(limit);

    Ok(EntityView {
        entity: entity.to_string(),
        champion: champion.map(|v| v.version),
        challenger: challenger.map(|v| v.version),
        versions,
    })
}
