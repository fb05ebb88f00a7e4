use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{debug, error, info, warn};

use sharevault::{Config, Database, DirectoryTree, LocalObjectStore, ShareService};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = sharevault::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        sharevault::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    info!("sharevault starting");

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database {}: {e}", config.database.path);
            std::process::exit(1);
        }
    };

    let store = match LocalObjectStore::new(&config.storage.root) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open object store {}: {e}", config.storage.root);
            std::process::exit(1);
        }
    };

    let tree = DirectoryTree::from_config(db.clone(), store.clone(), &config);
    let shares = ShareService::from_config(db.clone(), &config);

    info!(
        database = %config.database.path,
        storage = %config.storage.root,
        max_depth = config.tree.max_depth,
        token_bytes = config.shares.token_bytes,
        "sharevault ready"
    );

    start_shard_cleanup_task(store);

    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }

    info!("sharevault shutting down");
    drop((tree, shares));
    db.pool().close().await;
}

/// Remove shard directories emptied by deletes, once an hour.
fn start_shard_cleanup_task(store: Arc<LocalObjectStore>) {
    tokio::spawn(async move {
        const CLEANUP_INTERVAL_SECS: u64 = 3600;

        let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));

        // Skip the first immediate tick
        interval.tick().await;

        loop {
            interval.tick().await;

            let store = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || store.cleanup_empty_shards()).await {
                Ok(Ok(0)) => debug!("No empty shard directories to remove"),
                Ok(Ok(removed)) => info!(removed, "Removed empty shard directories"),
                Ok(Err(e)) => warn!(error = %e, "Failed to clean up shard directories"),
                Err(e) => warn!(error = %e, "Shard cleanup task failed"),
            }
        }
    });
}
