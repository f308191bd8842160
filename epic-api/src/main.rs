//! EPIC API Server Entry Point
//!
//! Bootstraps configuration and logging, opens the configured store and
//! starts the Axum HTTP server.

use std::sync::Arc;

use axum::Router;
use epic_api::services::seed_demo;
use epic_api::telemetry::{init_tracer, TelemetryConfig};
use epic_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig, DbConfig, PgStore,
    SharedStore, StorageBackend,
};
use epic_storage::InMemoryStore;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let api_config = ApiConfig::from_env()?;
    init_tracer(&TelemetryConfig::new(api_config.log_format))?;

    let store = open_store(api_config.storage).await?;
    if api_config.seed_demo {
        seed_demo(store.as_ref()).await?;
    }

    let addr = api_config.socket_addr()?;
    let state = AppState::new(store, AuthConfig::from_env(), api_config);
    let app: Router = create_api_router(state)?;

    tracing::info!(%addr, "Starting EPIC API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn open_store(backend: StorageBackend) -> ApiResult<SharedStore> {
    match backend {
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on shutdown");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let store = PgStore::from_config(&DbConfig::from_env())?;
            store.migrate().await?;
            tracing::info!(pool_size = store.pool_size(), "Connected to PostgreSQL");
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
