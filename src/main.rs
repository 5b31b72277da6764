use std::process::ExitCode;
use std::sync::Arc;

use sui_indexer_service::{
    api, blockchain::Scanner, cache::AppCache, config::Config, db, state::AppState, ChainClient,
    SuiRpcClient,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting sui-indexer-service");

    let config = Config::from_env();
    info!(
        "Network: {} ({}), RPC endpoint: {}",
        config.network.display_name, config.network.description, config.network.rpc_url
    );

    let db_pool = db::connection::establish_connection(&config.database_url).await?;
    info!("Database connection established");

    let client: Arc<dyn ChainClient> = Arc::new(SuiRpcClient::new(&config)?);
    let scanner = Arc::new(Scanner::new(client, db_pool.clone(), &config));
    scanner.initialize().await?;

    let cache = AppCache::from_config(&config);
    info!(
        "Cache initialized with TTL: {:?} and capacity: {}",
        config.cache_ttl, config.cache_max_capacity
    );

    let shutdown = CancellationToken::new();
    let scanner_task = tokio::spawn(scanner.clone().run(config.scan_interval, shutdown.clone()));

    let app_state = Arc::new(AppState {
        config: config.clone(),
        db_pool,
        cache,
        scanner,
    });

    let app = api::create_router(app_state);
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Starting server on {}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    scanner_task.await?;
    info!("Shutdown complete");

    Ok(())
}
