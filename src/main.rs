use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tokio::sync::Notify;
use tracing::{error, info, warn};

use trend_ingest::tracing::init_tracing;
use trend_ingest::util::env::{env_parse_opt, preflight_check};
use trend_ingest::{
    DatabaseConfig, Db, IngestConfig, MemoryStore, Pipeline, RunStatus, TrendStore,
};

#[derive(Parser, Debug)]
#[command(
    name = "trend-ingest",
    version,
    about = "Fetch social and web trends and store them in Postgres"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Emit logs as one JSON object per line
    #[arg(long = "json-logs", global = true, action = ArgAction::SetTrue)]
    json_logs: bool,

    // Allow `trend-ingest --once` without the explicit `run` subcommand.
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingestion pipeline (default when no command supplied)
    Run(RunArgs),
    /// Apply pending schema migrations and exit
    Migrate,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Repeat the run with this delay in seconds between iterations.
    /// If omitted, falls back to INGEST_LOOP_SECS, else a single run.
    #[arg(long)]
    loop_secs: Option<u64>,
    /// Run a single iteration even if INGEST_LOOP_SECS is set
    #[arg(long = "once", action = ArgAction::SetTrue)]
    once: bool,
    /// Fetch and normalize but keep writes in memory
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,
}

#[derive(Clone, Copy, Debug)]
enum LoopMode {
    Once,
    Continuous { sleep_secs: u64 },
}

const LOOP_SECS_ENV: &str = "INGEST_LOOP_SECS";

fn resolve_loop_mode(args: &RunArgs) -> LoopMode {
    if args.once {
        return LoopMode::Once;
    }
    match args.loop_secs.or_else(|| env_parse_opt(LOOP_SECS_ENV)) {
        Some(sleep_secs) => LoopMode::Continuous { sleep_secs },
        None => LoopMode::Once,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("info,sqlx=warn", cli.json_logs)?;

    match cli.command {
        Some(Command::Migrate) => migrate().await,
        Some(Command::Run(args)) => run(args).await,
        None => run(cli.run).await,
    }
}

async fn migrate() -> Result<()> {
    let cfg = DatabaseConfig {
        auto_migrate: false,
        ..DatabaseConfig::from_env()?
    };
    let db = Db::connect(&cfg).await?;
    let applied = db.run_migrations().await?;
    info!(applied, "migrations complete");
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    preflight_check(
        "trend-ingest",
        &["TWITTER_API_KEY", "GOOGLE_API_KEY"],
        &[
            "TWITTER_API_KEY",
            "TWITTER_BASE_URL",
            "GOOGLE_API_KEY",
            "GOOGLE_BASE_URL",
            "PROVIDER_TIMEOUT_SECS",
            "TREND_FETCH_CONCURRENCY",
            "DATABASE_URL",
            "DB_SCHEMA",
            LOOP_SECS_ENV,
        ],
    )?;
    let cfg = IngestConfig::from_env()?;

    let store: Arc<dyn TrendStore> = if args.dry_run {
        info!("dry run: writes stay in memory");
        Arc::new(MemoryStore::new())
    } else {
        let db_cfg = DatabaseConfig::from_env()?;
        Arc::new(Db::connect(&db_cfg).await?)
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let wake = Arc::new(Notify::new());
    {
        let cancel = cancel.clone();
        let wake = wake.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("ctrl+c received; no new provider calls, in-flight writes will finish");
                cancel.store(true, Ordering::SeqCst);
                wake.notify_one();
            }
        });
    }

    let pipeline = Pipeline::from_config(&cfg, store)
        .context("building provider clients")?
        .with_cancel_flag(cancel.clone());

    let mode = resolve_loop_mode(&args);
    info!(?mode, "loop mode");
    loop {
        let summary = pipeline.run_ingestion().await;
        println!("{}", serde_json::to_string(&summary)?);

        let failed = summary.status == RunStatus::Failed;
        if failed {
            error!(failures = summary.failures.len(), "ingestion run failed");
        }
        let sleep_secs = match mode {
            LoopMode::Once => {
                if failed {
                    bail!("ingestion run failed");
                }
                return Ok(());
            }
            LoopMode::Continuous { sleep_secs } => sleep_secs,
        };
        if cancel.load(Ordering::SeqCst) {
            info!("cancelled; exiting loop");
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(sleep_secs)) => {}
            _ = wake.notified() => {
                info!("cancelled while idle; exiting loop");
                return Ok(());
            }
        }
    }
}
