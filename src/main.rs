mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cli::{Cli, Commands, ServeArgs, WorkerArgs};
use dispatcher::api::{self, state::AppState};
use dispatcher::cache::StatusCache;
use dispatcher::config::Config;
use dispatcher::observability::{self, Metrics};
use dispatcher::queue::JobQueue;
use dispatcher::store::JobStore;
use dispatcher::sweeper::TimeoutSweeper;
use dispatcher::vendor::VendorClient;
use dispatcher::worker::{Worker, WorkerConfig};
use dispatcher::AnyError;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => run_serve(args).await?,
        Commands::Worker(args) => run_worker(args).await?,
    }

    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<(), AnyError> {
    let config = Config::load().map_err(|e| format!("failed to load config: {}", e))?;

    let store = Arc::new(JobStore::open(args.data_dir.join("jobs"))?);
    let queue = Arc::new(JobQueue::open(args.data_dir.join("queue"))?);
    let cache = Arc::new(StatusCache::new(Duration::from_secs(config.cache_ttl_secs)));
    let vendors = Arc::new(VendorClient::new(
        config.vendor_configs(),
        config.api_base_url.clone(),
    )?);
    let metrics = Arc::new(Metrics::new());

    let shutdown = CancellationToken::new();

    let sweeper = TimeoutSweeper::new(
        store.clone(),
        cache.clone(),
        metrics.clone(),
        "asyncVendor".to_string(),
        Duration::from_secs(config.sweep_interval_secs),
    );
    let sweeper_shutdown = shutdown.clone();
    let sweeper_handle = tokio::spawn(async move { sweeper.run(sweeper_shutdown).await });

    let address = args.address;

    let state = AppState::new(config, store, queue, cache, vendors, metrics.clone());

    let server_shutdown = shutdown.clone();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        api::shutdown_signal().await;
        signal_shutdown.cancel();
    });

    api::serve(address, state, server_shutdown).await?;
    sweeper_handle.await.ok();

    Ok(())
}

async fn run_worker(args: WorkerArgs) -> Result<(), AnyError> {
    let config = Config::load().map_err(|e| format!("failed to load config: {}", e))?;

    let store = Arc::new(JobStore::open(args.data_dir.join("jobs"))?);
    let queue = Arc::new(JobQueue::open(args.data_dir.join("queue"))?);
    let cache = Arc::new(StatusCache::new(Duration::from_secs(config.cache_ttl_secs)));
    let vendors = Arc::new(VendorClient::new(
        config.vendor_configs(),
        config.api_base_url.clone(),
    )?);
    let metrics = Arc::new(Metrics::new());

    let worker_config = WorkerConfig {
        sync_vendor: "syncVendor".to_string(),
        async_vendor: "asyncVendor".to_string(),
    };
    let worker = Worker::new(store, queue, cache, vendors, metrics, worker_config);

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        api::shutdown_signal().await;
        signal_shutdown.cancel();
    });

    info!("dispatch worker starting");
    worker.run(shutdown).await;
    Ok(())
}
