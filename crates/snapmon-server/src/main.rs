use anyhow::{Context, Result};
use snapmon_server::app;
use snapmon_server::config::ServerConfig;
use snapmon_server::state::AppState;
use snapmon_storage::SnapshotStore;
use std::net::SocketAddr;
use std::path::Path;
use tokio::signal;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("snapmon=info".parse()?))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(&path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => ServerConfig::load(DEFAULT_CONFIG_PATH)?,
        None => {
            tracing::warn!(path = DEFAULT_CONFIG_PATH, "Config file not found, using defaults");
            ServerConfig::default()
        }
    };

    run_server(config).await
}

async fn run_server(config: ServerConfig) -> Result<()> {
    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.database.data_dir,
        db = %config.database.redacted_url(),
        latest_count = config.latest_count,
        "snapmon-server starting"
    );

    config.database.prepare()?;
    let store = SnapshotStore::connect(&config.database.store_options())
        .await
        .with_context(|| format!("Failed to open database {}", config.database.redacted_url()))?;

    let http_addr: SocketAddr = config
        .listen_addr()
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.listen_addr()))?;

    let state = AppState::new(store, config);
    let app = app::build_http_app(state);
    let listener = tokio::net::TcpListener::bind(http_addr).await?;

    tracing::info!(http = %http_addr, "Server started");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        signal::ctrl_c().await.ok();
        tracing::info!("Shutting down gracefully");
    })
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
