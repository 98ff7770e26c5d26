//! listcache API Server Entry Point
//!
//! Loads configuration, resolves cache credentials, connects the cache store
//! and starts the Axum HTTP server.

use listcache_api::telemetry::{init_tracer, TelemetryConfig};
use listcache_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = ApiConfig::from_env().map_err(|e| ApiError::internal_error(e.to_string()))?;

    let telemetry_config = TelemetryConfig::default().with_log_format(config.log_format);
    init_tracer(&telemetry_config)?;

    let addr = config
        .bind_addr()
        .map_err(|e| ApiError::invalid_input(e.to_string()))?;

    let state = AppState::from_config(config).await.map_err(|e| {
        tracing::error!(error = %e, "Cache bootstrap failed");
        ApiError::service_unavailable(format!("Cache bootstrap failed: {}", e))
    })?;

    if state.config.reconcile_on_start {
        let report = state.reconciler.reconcile().await?;
        tracing::info!(
            records = report.records_scanned,
            index_entries = report.index_entries_scanned,
            reindexed = report.reindexed.len(),
            orphans_removed = report.orphans_removed.len(),
            unrepairable = report.unrepairable.len(),
            "Startup reconciliation finished"
        );
    }

    let app = create_api_router(state);

    tracing::info!(%addr, "Starting listcache API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
