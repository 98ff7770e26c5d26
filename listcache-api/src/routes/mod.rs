//! HTTP Routes Module
//!
//! - Property search and detail lookup
//! - Change-stream batch ingestion
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document
//!
//! Every response, errors and preflights included, carries the same fixed
//! cross-origin header set.

pub mod health;
pub mod property;
pub mod sync;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, StatusCode, Uri},
    middleware::from_fn,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use utoipa::OpenApi;

use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;

// ============================================================================
// CORS CONTRACT
// ============================================================================

pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_METHODS: &str = "POST,OPTIONS";
pub const CORS_ALLOW_HEADERS: &str =
    "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token,X-Requested-With";

// ============================================================================
// SHARED HANDLERS
// ============================================================================

/// Preflight: the CORS headers are added by the router layers.
async fn preflight() -> impl IntoResponse {
    StatusCode::OK
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::route_not_found(uri.path())
}

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Build the full application router.
pub fn create_api_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let property_routes = Router::new()
        .route("/property-search", post(property::search).options(preflight))
        .route("/property-detail", post(property::detail).options(preflight))
        .route("/property-sync", post(sync::apply_batch).options(preflight))
        .with_state(state.clone());

    Router::new()
        .merge(property_routes)
        .nest("/health", health::create_router(state.cache.clone()))
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .fallback(not_found)
        .layer(from_fn(observability_middleware))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(CORS_ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ))
}
