//! Geospatial index maintainer.
//!
//! Keeps one index entry per live cache key, moved in step with the primary
//! projection for the same event. The index supports add-or-replace by
//! member name, so no existence check precedes a write.

use std::sync::Arc;

use listcache_core::{CacheKey, ChangeEvent, Coordinates, GeoMatch, RadiusQuery};
use tracing::debug;

use crate::traits::{ListingCache, StorageResult};

/// Default name of the geospatial index in the cache store.
pub const DEFAULT_GEO_INDEX_KEY: &str = "properties:geo";

#[derive(Debug, Clone)]
pub struct GeoIndexMaintainer {
    cache: Arc<dyn ListingCache>,
    index_key: String,
}

impl GeoIndexMaintainer {
    pub fn new(cache: Arc<dyn ListingCache>, index_key: impl Into<String>) -> Self {
        Self {
            cache,
            index_key: index_key.into(),
        }
    }

    pub fn index_key(&self) -> &str {
        &self.index_key
    }

    /// Apply one event to the index.
    pub async fn apply(&self, event: &ChangeEvent) -> StorageResult<()> {
        match event {
            ChangeEvent::Upsert { key, location, .. } => self.place(key, *location).await,
            ChangeEvent::Remove { key } => self.remove(key).await.map(|_| ()),
        }
    }

    /// Write or overwrite the entry for `key`.
    pub async fn place(&self, key: &CacheKey, location: Coordinates) -> StorageResult<()> {
        self.cache.geo_upsert(&self.index_key, key, location).await?;
        debug!(
            index = %self.index_key,
            key = %key,
            longitude = location.longitude,
            latitude = location.latitude,
            "Indexed"
        );
        Ok(())
    }

    /// Drop the entry for `key`. Returns whether one was there.
    pub async fn remove(&self, key: &CacheKey) -> StorageResult<bool> {
        let removed = self.cache.geo_remove(&self.index_key, key).await?;
        debug!(index = %self.index_key, key = %key, removed, "Unindexed");
        Ok(removed)
    }

    pub async fn position(&self, key: &CacheKey) -> StorageResult<Option<Coordinates>> {
        self.cache.geo_position(&self.index_key, key).await
    }

    /// Radius search over the index. Callers validate the query first.
    pub async fn search(&self, query: &RadiusQuery) -> StorageResult<Vec<GeoMatch>> {
        self.cache.geo_search(&self.index_key, query).await
    }

    pub async fn members(&self) -> StorageResult<Vec<CacheKey>> {
        self.cache.geo_members(&self.index_key).await
    }
}
