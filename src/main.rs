//! Pawvault: Health Disclosure & Alert Engine
//!
//! Main entry point for the HTTP service.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pawvault::adapters::SqliteStorage;
use pawvault::server::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_path = std::env::var("PAWVAULT_DB").unwrap_or_else(|_| "pawvault.db".to_string());
    let addr = std::env::var("PAWVAULT_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    tracing::info!("Starting Pawvault (db: {db_path})...");

    let storage = Arc::new(SqliteStorage::new(&db_path)?);
    let state = Arc::new(AppState::new(storage));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");
    axum::serve(listener, app).await?;

    tracing::info!("Pawvault shutdown complete.");
    Ok(())
}
