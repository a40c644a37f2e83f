use std::sync::Arc;

use paperdesk_core::{Config, Paperdesk};
use tracing_subscriber::EnvFilter;

mod error;
mod handlers;
mod models;
mod owner;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    let desk = Paperdesk::from_config(&config)?;
    if !desk.is_persistent() {
        tracing::warn!("no database configured, favorites and history will not survive a restart");
    }

    let app = routes::router(Arc::new(AppState { desk }));

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
