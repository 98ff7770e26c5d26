//! Property query endpoints: radius search and detail lookup.
//!
//! Both are read-only. An empty result and an unknown key answer 200.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use listcache_core::GeoMatch;
use listcache_storage::SearchParams;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics::with_metrics;
use crate::types::{DetailRequest, SearchRequest};

/// POST /property-search - Listings within a radius, nearest first
#[utoipa::path(
    post,
    path = "/property-search",
    tag = "Properties",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Matches ordered by distance", body = Vec<GeoMatch>),
        (status = 400, description = "Invalid search parameters", body = ApiError),
        (status = 503, description = "Cache store unavailable", body = ApiError),
    ),
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<GeoMatch>>> {
    let Json(req) = payload?;
    let matches = state.engine.radius_search(&SearchParams::from(req)).await?;
    with_metrics(|m| m.record_search(matches.len()));
    Ok(Json(matches))
}

/// POST /property-detail - All cached attributes of one listing
#[utoipa::path(
    post,
    path = "/property-detail",
    tag = "Properties",
    request_body = DetailRequest,
    responses(
        (status = 200, description = "Attribute map, empty when the key is unknown", body = BTreeMap<String, String>),
        (status = 400, description = "Missing property key", body = ApiError),
        (status = 503, description = "Cache store unavailable", body = ApiError),
    ),
)]
pub async fn detail(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DetailRequest>, JsonRejection>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let Json(req) = payload?;
    let attributes = state.engine.detail(&req.property_key).await?;
    Ok(Json(attributes))
}
