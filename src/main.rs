use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use field_vault::config::AppConfig;
use field_vault::database::PgStore;
use field_vault::handlers::{app, AppState};
use field_vault::services::VaultService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, ENCRYPTION_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!("Starting field-vault in {:?} mode", config.environment);

    // Fatal on a missing, short or mismatched key: nothing is served without one
    let codec = config.encryption.codec().context("encryption is not configured")?;
    if config.encryption.using_default_key {
        tracing::warn!("Using the development default encryption key");
    }
    tracing::info!("Encryption key fingerprint {}", codec.key().fingerprint());

    let store = PgStore::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    let service = VaultService::new(Arc::new(store), Arc::new(codec), config.schemas.clone());
    let state = AppState::new(Arc::new(service), config.api.max_page_size)
        .with_request_logging(config.api.enable_request_logging);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("field-vault listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
