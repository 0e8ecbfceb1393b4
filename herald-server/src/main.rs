//! Herald Server
//!
//! A multi-tenant notification platform: direct and broadcast sends,
//! per-recipient preferences, inboxes and plan quotas.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use herald_core::processors::worker_pool;
use herald_core::queue::TaskQueue;
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Herald - multi-tenant notification server
#[derive(Parser, Debug)]
#[command(name = "herald-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "HERALD_CONFIG", default_value = "./herald-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting herald-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    let worker_config = loaded_config.worker.clone();
    tracing::info!("Configuration loaded from {:?}", args.config);

    let shared_config = loaded_config.into_shared();

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    // Workers hold a connection while they run a task.
    let max_connections =
        u32::try_from(worker_config.concurrency).map_or(u32::MAX, |workers| workers.saturating_add(10));
    let db_pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let queue = TaskQueue::new(db_pool.clone(), worker_config.max_retry);
    let state = AppState::new(db_pool.clone(), shared_config, queue.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tracing::info!(
        concurrency = worker_config.concurrency,
        "Starting task workers"
    );
    let workers = tokio::spawn(
        worker_pool(db_pool.clone(), queue, worker_config, shutdown_rx).run(),
    );

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(state.clone(), config_loader);

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // In-flight tasks finish before the pool closes.
    tracing::info!("Stopping task workers...");
    if let Err(e) = shutdown_tx.send(true) {
        tracing::error!("Failed to signal task workers to stop: {}", e);
    }
    if let Err(e) = workers.await {
        tracing::error!("Worker pool terminated abnormally: {}", e);
    }

    reload_notify.notify_one();

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
