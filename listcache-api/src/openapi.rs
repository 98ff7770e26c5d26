//! OpenAPI Specification for the listcache API
//!
//! Generated with utoipa from the handler annotations and the request and
//! response types.

use listcache_core::{CacheKey, Coordinates, DistanceUnit, GeoMatch, SortOrder, StreamBatch};
use listcache_storage::{BatchReport, DroppedRecord};
use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{health, property, sync};
use crate::telemetry::metrics;
use crate::types::{DetailRequest, SearchRequest, SyncResponse};

/// OpenAPI document for the listcache API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "listcache API",
        version = "0.1.0",
        description = "Read-optimized property listing cache: radius search, detail lookup and change-stream ingestion",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Properties", description = "Radius search and detail lookup over cached listings"),
        (name = "Sync", description = "Change-stream ingestion into the cache"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        property::search,
        property::detail,
        sync::apply_batch,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            SearchRequest, DetailRequest, SyncResponse,
            GeoMatch, CacheKey, Coordinates, DistanceUnit, SortOrder,
            StreamBatch, BatchReport, DroppedRecord,
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth,
            ApiError, ErrorCode
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "listcache API");

        let tags = openapi
            .tags
            .as_ref()
            .ok_or_else(|| "OpenAPI tags missing".to_string())?;
        assert_eq!(tags.len(), 4);

        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.schemas.contains_key("GeoMatch"));
        assert!(components.schemas.contains_key("ApiError"));
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();
        for path in ["/property-search", "/property-detail", "/property-sync", "/health/ready", "/metrics"] {
            assert!(openapi.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        serde_json::from_str::<serde_json::Value>(&json)
            .map_err(|e| format!("Generated JSON invalid: {}", e))?;
        assert!(json.contains("listcache API"));
        Ok(())
    }
}
