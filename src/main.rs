use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::{info, warn};
use registry_sync::{
    CancellationToken, EngineConfig, MemoryStore, RecomputationCoordinator,
    ReconciliationScheduler, Reconciler, RegistrySnapshot,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "registry-sync")]
#[command(about = "Keep sectoral profiles and household aggregates in step with registry facts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile every derived record in a snapshot once
    #[command(after_help = "\
Examples:
  registry-sync reconcile registry.json
  registry-sync reconcile registry.json --as-of 2026-06-15 --out derived.json")]
    Reconcile {
        /// Registry snapshot (JSON)
        snapshot: PathBuf,

        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Reference date for age-based flags, defaults to today
        #[arg(long, value_parser = parse_date)]
        as_of: Option<NaiveDate>,

        /// Write the reconciled snapshot, derived records included
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Reconcile a snapshot periodically until interrupted
    Watch {
        /// Registry snapshot (JSON)
        snapshot: PathBuf,

        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got {value}: {e}"))
}

fn load(
    snapshot: &Path,
    config: Option<&Path>,
) -> anyhow::Result<(EngineConfig, RecomputationCoordinator<MemoryStore>)> {
    let config = match config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    info!("{config}");
    let store = RegistrySnapshot::from_json_file(snapshot)
        .and_then(RegistrySnapshot::into_store)
        .with_context(|| format!("loading snapshot {}", snapshot.display()))?;
    let coordinator = RecomputationCoordinator::new(store, &config)?;
    Ok((config, coordinator))
}

fn reconcile(
    snapshot: &Path,
    config: Option<&Path>,
    as_of: Option<NaiveDate>,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let (config, coordinator) = load(snapshot, config)?;
    let as_of = as_of.unwrap_or_else(|| Local::now().date_naive());
    let report = Reconciler::new(&coordinator, config.reconcile.clone())
        .run(as_of, &CancellationToken::new())?;
    println!("{report}");
    for failure in &report.errors {
        warn!("{}: {}", failure.entity, failure.message);
    }

    if let Some(out) = out {
        RegistrySnapshot::from_store(coordinator.store(), true)?
            .to_json_file(out)
            .with_context(|| format!("writing {}", out.display()))?;
    }
    Ok(())
}

async fn watch(snapshot: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let (config, coordinator) = load(snapshot, config)?;
    let scheduler = ReconciliationScheduler::new(Arc::new(coordinator), config.reconcile);
    let token = CancellationToken::new();
    let ctrl_c = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping reconciliation");
            }
            token.cancel();
        })
    };
    let sweeps = scheduler.run(token).await?;
    ctrl_c.abort();
    info!("Completed {sweeps} reconciliation sweeps");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Reconcile {
            snapshot,
            config,
            as_of,
            out,
        } => tokio::task::block_in_place(|| {
            reconcile(&snapshot, config.as_deref(), as_of, out.as_deref())
        }),
        Command::Watch { snapshot, config } => watch(&snapshot, config.as_deref()).await,
    }
}
