//! # Gatewatch
//!
//! Watches facility access records and alerts chat subscribers when the
//! people they follow enter or leave.
//!
//! Usage:
//!   gatewatch                      # Serve the API and run the poll loop
//!   gatewatch --config ./gw.toml   # Explicit config file
//!   gatewatch tick                 # Run one reconciliation tick and exit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatewatch_channels::{HttpAccessSource, HttpUserDirectory, WhatsAppNotifier};
use gatewatch_core::GatewatchConfig;
use gatewatch_core::traits::{AccessSource, NotificationChannel, TrackStore};
use gatewatch_db::SqliteTrackStore;
use gatewatch_gateway::AppState;
use gatewatch_scheduler::{AccessReconciler, NotificationDispatcher, PollScheduler};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gatewatch",
    version,
    about = "🚪 Gatewatch — facility access alerts for chat subscribers"
)]
struct Cli {
    /// Config file (default: $GATEWATCH_CONFIG or ~/.gatewatch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and the poll loop until Ctrl-C
    Serve,
    /// Run a single reconciliation tick, ignoring the quiet window
    Tick,
}

/// Everything wired up from config.
struct Runtime {
    config: GatewatchConfig,
    store: Arc<SqliteTrackStore>,
    access: Arc<HttpAccessSource>,
    notifier: Arc<WhatsAppNotifier>,
    directory: Arc<HttpUserDirectory>,
    scheduler: PollScheduler,
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        "gatewatch=debug,gatewatch_scheduler=debug,gatewatch_channels=debug,gatewatch_gateway=debug,gatewatch_db=debug,tower_http=debug"
    } else {
        "gatewatch=info,gatewatch_scheduler=info,gatewatch_channels=info,gatewatch_gateway=info,gatewatch_db=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<GatewatchConfig> {
    let path = explicit.or_else(|| std::env::var("GATEWATCH_CONFIG").ok().map(PathBuf::from));
    let mut config = match path {
        Some(path) => GatewatchConfig::load_from(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GatewatchConfig::load()?,
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn build_runtime(config: GatewatchConfig) -> Result<Runtime> {
    let db_path = config.database.resolved_path();
    let store = Arc::new(SqliteTrackStore::open(&db_path)?);
    let access = Arc::new(HttpAccessSource::new(&config.access)?);
    let notifier = Arc::new(WhatsAppNotifier::new(
        &config.notification,
        config.locations.clone(),
    )?);
    let directory = Arc::new(HttpUserDirectory::new(&config.directory)?);

    let reconciler = Arc::new(AccessReconciler::new(
        store.clone(),
        NotificationDispatcher::new(notifier.clone()),
    ));
    let scheduler = PollScheduler::from_config(access.clone(), reconciler, &config.poll)?;

    Ok(Runtime {
        config,
        store,
        access,
        notifier,
        directory,
        scheduler,
    })
}

async fn serve(rt: Runtime) -> Result<()> {
    let Runtime {
        config,
        store,
        access,
        notifier,
        directory,
        scheduler,
    } = rt;

    let store: Arc<dyn TrackStore> = store;
    let access: Arc<dyn AccessSource> = access;
    let notifier: Arc<dyn NotificationChannel> = notifier;

    let state = Arc::new(AppState {
        store,
        channel: notifier,
        access,
        directory,
        auth_token: config.gateway.auth_token.clone(),
        start_time: std::time::Instant::now(),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    // Dropping the sender (server error) also stops the poll loop.
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Failed to listen for Ctrl-C: {e}");
            return;
        }
        tracing::info!("🛑 Shutdown requested — finishing current tick");
        let _ = shutdown_tx.send(true);
    };

    let served = gatewatch_gateway::start(&config.gateway, state, shutdown).await;
    poller.await.context("poll loop panicked")?;
    served
}

async fn tick(rt: Runtime) -> Result<()> {
    let outcome = rt.scheduler.tick().await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let config = load_config(cli.config)?;
    tracing::info!("⚙️ Config: {}", config.summary());

    let rt = build_runtime(config)?;
    tracing::info!(
        "🗄️ {} subscriptions loaded",
        rt.store.count(gatewatch_core::TrackKind::Track)?
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(rt).await,
        Command::Tick => tick(rt).await,
    }
}
