//! Request and response bodies for the property endpoints.

use listcache_core::{DistanceUnit, SortOrder};
use listcache_storage::{BatchReport, SearchParams};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// SEARCH
// ============================================================================

/// Body of `POST /property-search`.
///
/// Missing coordinates are reported by the query engine, so every field is
/// optional at the parsing stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchRequest {
    /// Latitude of the search center, decimal degrees.
    #[serde(default, alias = "latitude")]
    pub lat: Option<f64>,

    /// Longitude of the search center, decimal degrees.
    #[serde(default, alias = "longitude")]
    pub lon: Option<f64>,

    /// Search radius; defaults to 25 in the default unit.
    #[serde(default)]
    pub radius: Option<f64>,

    #[serde(default)]
    pub unit: Option<DistanceUnit>,

    /// `ASC` (default) or `DESC` by distance.
    #[serde(default)]
    pub sort: Option<SortOrder>,

    /// Cap on the number of matches returned.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl From<SearchRequest> for SearchParams {
    fn from(req: SearchRequest) -> Self {
        SearchParams {
            longitude: req.lon,
            latitude: req.lat,
            radius: req.radius,
            unit: req.unit,
            order: req.sort,
            limit: req.limit,
        }
    }
}

// ============================================================================
// DETAIL
// ============================================================================

/// Body of `POST /property-detail`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DetailRequest {
    /// Cache key, `<pk>#<sk>`.
    #[serde(default)]
    pub property_key: String,
}

// ============================================================================
// SYNC
// ============================================================================

/// Response of `POST /property-sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SyncResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: BatchReport,
}

impl From<BatchReport> for SyncResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            message: report.message(),
            report,
        }
    }
}
