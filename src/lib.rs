pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub use config::Config;

/// Starts the server and runs until Ctrl+C.
///
/// Startup is the only place a fault may terminate the process (bad config,
/// unbindable port); once serving, every handler fault converts to a
/// structured error response.
pub async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    init_tracing(&config.general.log_level);

    info!("keywarden v{} starting...", env!("CARGO_PKG_VERSION"));

    let state = api::create_app_state(&config).await?;
    let app = api::router(state, &config.server.cors_allowed_origins);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr} (port already in use?)"))?;

    info!("Listening on http://{addr}");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    server.await.context("Server error")?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {e}"),
    }
}
