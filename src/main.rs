use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use laborhood::config::AppConfig;
use laborhood::handlers;
use laborhood::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.admin_principals.is_empty() {
        tracing::warn!("ADMIN_PRINCIPALS not set, nobody can assign roles");
    }

    let state = Arc::new(AppState::new(config.clone()));
    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting replica backend on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
