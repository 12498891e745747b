use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use laborhood::config::AppConfig;
use laborhood::services::actor::http::HttpActor;
use laborhood::services::health::check_health;
use laborhood::LaborClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        backend = %config.backend_url,
        caller = %config.caller_principal,
        "running health check"
    );

    let actor = HttpActor::new(config.backend_url.clone(), config.caller_principal.clone());
    let client = LaborClient::new(config);
    client.connect(Arc::new(actor));

    let report = check_health(&client).await;
    print!("{report}");

    anyhow::ensure!(report.is_healthy(), "one or more components are unhealthy");
    Ok(())
}
