//! Query engine: detail lookup and radius search over the projection.
//!
//! Both operations are read-only. A missing key and an empty result set are
//! ordinary answers, not errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use listcache_core::{
    CacheKey, Coordinates, DistanceUnit, GeoMatch, ListcacheResult, RadiusQuery, SortOrder,
    ValidationError, DEFAULT_SEARCH_RADIUS,
};
use tracing::debug;

use crate::geo_index::GeoIndexMaintainer;
use crate::traits::ListingCache;

/// Caller-facing radius search parameters; unset fields take the engine's
/// defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub radius: Option<f64>,
    pub unit: Option<DistanceUnit>,
    pub order: Option<SortOrder>,
    pub limit: Option<usize>,
}

impl SearchParams {
    pub fn at(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude: Some(longitude),
            latitude: Some(latitude),
            ..Self::default()
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_unit(mut self, unit: DistanceUnit) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// Defaults applied to radius searches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryDefaults {
    pub radius: f64,
    pub unit: DistanceUnit,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            radius: DEFAULT_SEARCH_RADIUS,
            unit: DistanceUnit::Miles,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryEngine {
    cache: Arc<dyn ListingCache>,
    index: GeoIndexMaintainer,
    defaults: QueryDefaults,
}

impl QueryEngine {
    pub fn new(cache: Arc<dyn ListingCache>, index_key: impl Into<String>) -> Self {
        Self {
            index: GeoIndexMaintainer::new(cache.clone(), index_key),
            cache,
            defaults: QueryDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: QueryDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> QueryDefaults {
        self.defaults
    }

    /// All attributes stored under `key`, or an empty map.
    pub async fn detail(&self, key: &str) -> ListcacheResult<BTreeMap<String, String>> {
        if key.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "property_key".to_string(),
            }
            .into());
        }
        let key = CacheKey::from_stored(key);
        let attributes = self.cache.get_record(&key).await?;
        debug!(key = %key, found = !attributes.is_empty(), "Detail lookup");
        Ok(attributes)
    }

    /// Resolve defaults and check preconditions without touching the store.
    pub fn resolve(&self, params: &SearchParams) -> Result<RadiusQuery, ValidationError> {
        let longitude = params
            .longitude
            .ok_or_else(|| ValidationError::RequiredFieldMissing {
                field: "lon".to_string(),
            })?;
        let latitude = params
            .latitude
            .ok_or_else(|| ValidationError::RequiredFieldMissing {
                field: "lat".to_string(),
            })?;

        let query = RadiusQuery {
            center: Coordinates::new(longitude, latitude),
            radius: params.radius.unwrap_or(self.defaults.radius),
            unit: params.unit.unwrap_or(self.defaults.unit),
            order: params.order.unwrap_or_default(),
            limit: params.limit,
        };
        query.validate()?;
        Ok(query)
    }

    /// Indexed keys within the radius, nearest first by default.
    pub async fn radius_search(&self, params: &SearchParams) -> ListcacheResult<Vec<GeoMatch>> {
        let query = self.resolve(params)?;
        let matches = self.index.search(&query).await?;
        debug!(
            longitude = query.center.longitude,
            latitude = query.center.latitude,
            radius = query.radius,
            unit = query.unit.as_str(),
            hits = matches.len(),
            "Radius search"
        );
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryListingCache;
    use listcache_core::{AttributeValue, ListcacheError, PropertyRecord};

    const INDEX: &str = "properties:geo";

    fn engine() -> (Arc<InMemoryListingCache>, QueryEngine) {
        let cache = Arc::new(InMemoryListingCache::new());
        (cache.clone(), QueryEngine::new(cache, INDEX))
    }

    #[tokio::test]
    async fn test_detail_missing_key_is_empty() {
        let (_, engine) = engine();
        assert!(engine.detail("AG9#AGT9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detail_empty_key_is_rejected() {
        let (_, engine) = engine();
        let err = engine.detail("").await.unwrap_err();
        assert!(matches!(err, ListcacheError::Validation(_)));
    }

    #[tokio::test]
    async fn test_detail_returns_stored_attributes() {
        let (cache, engine) = engine();
        let record: PropertyRecord =
            [("city".to_string(), AttributeValue::Text("Queens".to_string()))]
                .into_iter()
                .collect();
        cache
            .replace_record(&CacheKey::from_stored("a#b"), &record)
            .await
            .unwrap();
        assert_eq!(engine.detail("a#b").await.unwrap(), record.to_cache_map());
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let (_, engine) = engine();
        let query = engine.resolve(&SearchParams::at(-73.9, 40.73)).unwrap();
        assert_eq!(query.radius, 25.0);
        assert_eq!(query.unit, DistanceUnit::Miles);
        assert_eq!(query.order, SortOrder::Ascending);
        assert_eq!(query.limit, None);
    }

    #[test]
    fn test_resolve_custom_defaults() {
        let (_, engine) = engine();
        let engine = engine.with_defaults(QueryDefaults {
            radius: 10.0,
            unit: DistanceUnit::Kilometers,
        });
        let query = engine.resolve(&SearchParams::at(0.0, 0.0)).unwrap();
        assert_eq!(query.radius, 10.0);
        assert_eq!(query.unit, DistanceUnit::Kilometers);
    }

    #[test]
    fn test_resolve_rejects_bad_input() {
        let (_, engine) = engine();
        let missing = SearchParams {
            longitude: Some(0.0),
            ..SearchParams::default()
        };
        assert_eq!(
            engine.resolve(&missing),
            Err(ValidationError::RequiredFieldMissing {
                field: "lat".to_string()
            })
        );
        assert!(engine.resolve(&SearchParams::at(181.0, 0.0)).is_err());
        assert!(engine.resolve(&SearchParams::at(0.0, -90.5)).is_err());
        assert!(engine
            .resolve(&SearchParams::at(0.0, 0.0).with_radius(0.0))
            .is_err());
    }

    #[tokio::test]
    async fn test_empty_index_yields_empty_result() {
        let (_, engine) = engine();
        let hits = engine
            .radius_search(&SearchParams::at(-73.9, 40.73))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
