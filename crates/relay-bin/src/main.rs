use anyhow::Context;
use pairlink_relay_lib::{config::Settings, ws_router, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = Arc::new(AppState::new(settings.clone()));
    let app = ws_router::create_router(state);

    let listener = TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    tracing::info!(addr = %settings.bind_addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
