//! # sphere-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the Sphere API.
//! Binds to configurable port (default 8080).

use std::sync::Arc;

use sphere_api::state::{AppConfig, AppState};
use sphere_content_client::{ConfigError as ContentConfigError, ContentClient, ContentStoreConfig};
use sphere_ledger::{AlloyLedger, ConfigError as LedgerConfigError, LedgerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing. LOG_FORMAT=json for log shippers.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Build configuration from environment.
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let auth_token = std::env::var("AUTH_TOKEN")
        .ok()
        .filter(|t| !t.is_empty());
    if auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set, authentication is disabled");
    }
    let decline_on_chain = std::env::var("DECLINE_ON_CHAIN")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(true);
    let config = AppConfig {
        port,
        auth_token,
        decline_on_chain,
    };

    // Initialize database pool (optional: absent means in-memory only).
    let db_pool = sphere_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let mut state = AppState::with_config(config);
    if let Some(pool) = db_pool {
        state = state.with_db_pool(pool);
    }

    // Credential contract adapter.
    match LedgerConfig::from_env() {
        Ok(ledger_config) => {
            let ledger = AlloyLedger::new(ledger_config).map_err(|e| {
                tracing::error!("Failed to create ledger client: {e}");
                e
            })?;
            if let Err(e) = ledger.verify_chain_id().await {
                tracing::warn!("Ledger chain check failed: {e}");
            }
            tracing::info!(
                contract = %ledger.config().contract_address,
                "Credential ledger configured"
            );
            state = state.with_ledger(Arc::new(ledger));
        }
        Err(LedgerConfigError::Missing(var)) => {
            tracing::warn!(
                "Ledger not configured ({var} unset). Payment and decision endpoints will return 503."
            );
        }
        Err(e) => return Err(e.into()),
    }

    // Content storage.
    match ContentStoreConfig::from_env() {
        Ok(content_config) => {
            let client = ContentClient::new(content_config).map_err(|e| {
                tracing::error!("Failed to create content storage client: {e}");
                e
            })?;
            tracing::info!("Content storage configured");
            state = state.with_content_client(client);
        }
        Err(ContentConfigError::Missing(var)) => {
            tracing::warn!("Content storage not configured ({var} unset). Uploads will return 503.");
        }
        Err(e) => return Err(e.into()),
    }

    // Hydrate in-memory stores from database (if connected).
    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    let app = sphere_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Sphere API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
