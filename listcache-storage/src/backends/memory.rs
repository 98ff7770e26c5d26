//! In-process cache store.
//!
//! Mirrors the Redis semantics closely enough that the sync and query paths
//! behave identically against either backend: full-record replace, geohash
//! latitude limits on insert, the same Earth radius and unit factors, and
//! distances rounded to four decimals. Search ties keep index insertion
//! order; re-adding an existing key keeps its original position.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use listcache_core::{
    great_circle_meters, round_distance, CacheKey, Coordinates, GeoMatch, PropertyRecord,
    RadiusQuery, SortOrder, StorageError,
};
use tokio::sync::RwLock;

use crate::traits::{ListingCache, StorageResult};

#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    seq: u64,
    location: Coordinates,
}

#[derive(Debug, Default)]
struct GeoIndex {
    next_seq: u64,
    entries: HashMap<CacheKey, IndexedPoint>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<CacheKey, BTreeMap<String, String>>,
    indexes: HashMap<String, GeoIndex>,
}

/// Cache store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryListingCache {
    state: RwLock<MemoryState>,
}

impl InMemoryListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Number of entries in the named index.
    pub async fn index_len(&self, index: &str) -> usize {
        self.state
            .read()
            .await
            .indexes
            .get(index)
            .map(|i| i.entries.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ListingCache for InMemoryListingCache {
    async fn replace_record(&self, key: &CacheKey, record: &PropertyRecord) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.records.insert(key.clone(), record.to_cache_map());
        Ok(())
    }

    async fn delete_record(&self, key: &CacheKey) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.records.remove(key).is_some())
    }

    async fn get_record(&self, key: &CacheKey) -> StorageResult<BTreeMap<String, String>> {
        let state = self.state.read().await;
        Ok(state.records.get(key).cloned().unwrap_or_default())
    }

    async fn geo_upsert(
        &self,
        index: &str,
        key: &CacheKey,
        location: Coordinates,
    ) -> StorageResult<()> {
        if !location.is_indexable() {
            return Err(StorageError::Rejected {
                operation: "GEOADD".to_string(),
                reason: format!(
                    "invalid longitude,latitude pair {},{}",
                    location.longitude, location.latitude
                ),
            });
        }

        let mut state = self.state.write().await;
        let geo = state.indexes.entry(index.to_string()).or_default();
        match geo.entries.get_mut(key) {
            Some(point) => point.location = location,
            None => {
                let seq = geo.next_seq;
                geo.next_seq += 1;
                geo.entries
                    .insert(key.clone(), IndexedPoint { seq, location });
            }
        }
        Ok(())
    }

    async fn geo_remove(&self, index: &str, key: &CacheKey) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .indexes
            .get_mut(index)
            .map(|geo| geo.entries.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn geo_position(
        &self,
        index: &str,
        key: &CacheKey,
    ) -> StorageResult<Option<Coordinates>> {
        let state = self.state.read().await;
        Ok(state
            .indexes
            .get(index)
            .and_then(|geo| geo.entries.get(key))
            .map(|p| p.location))
    }

    async fn geo_search(&self, index: &str, query: &RadiusQuery) -> StorageResult<Vec<GeoMatch>> {
        let state = self.state.read().await;
        let Some(geo) = state.indexes.get(index) else {
            return Ok(Vec::new());
        };

        let radius_meters = query.radius_meters();
        let mut hits: Vec<(f64, u64, &CacheKey, Coordinates)> = geo
            .entries
            .iter()
            .filter_map(|(key, point)| {
                let meters = great_circle_meters(query.center, point.location);
                (meters <= radius_meters).then_some((meters, point.seq, key, point.location))
            })
            .collect();

        hits.sort_by(|a, b| {
            let by_distance = match query.order {
                SortOrder::Ascending => a.0.total_cmp(&b.0),
                SortOrder::Descending => b.0.total_cmp(&a.0),
            };
            by_distance.then(a.1.cmp(&b.1))
        });

        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }

        let meters_per_unit = query.unit.meters_per_unit();
        Ok(hits
            .into_iter()
            .map(|(meters, _, key, location)| GeoMatch {
                key: key.clone(),
                coordinates: location,
                distance: round_distance(meters / meters_per_unit),
            })
            .collect())
    }

    async fn record_keys(&self) -> StorageResult<Vec<CacheKey>> {
        let state = self.state.read().await;
        let mut keys: Vec<CacheKey> = state.records.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn geo_members(&self, index: &str) -> StorageResult<Vec<CacheKey>> {
        let state = self.state.read().await;
        let mut members: Vec<CacheKey> = state
            .indexes
            .get(index)
            .map(|geo| geo.entries.keys().cloned().collect())
            .unwrap_or_default();
        members.sort();
        Ok(members)
    }

    async fn health_check(&self) -> StorageResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listcache_core::{offset_north, AttributeValue, DistanceUnit};

    const INDEX: &str = "properties:geo";

    fn record(pairs: &[(&str, &str)]) -> PropertyRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AttributeValue::Text(v.to_string())))
            .collect()
    }

    #[tokio::test]
    async fn test_replace_is_not_a_merge() {
        let cache = InMemoryListingCache::new();
        let key = CacheKey::from_stored("a#b");

        cache
            .replace_record(&key, &record(&[("price", "1000"), ("agent", "Lee")]))
            .await
            .unwrap();
        cache
            .replace_record(&key, &record(&[("price", "1100")]))
            .await
            .unwrap();

        let stored = cache.get_record(&key).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.get("price").map(String::as_str), Some("1100"));
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_ok() {
        let cache = InMemoryListingCache::new();
        let key = CacheKey::from_stored("missing#key");
        assert!(!cache.delete_record(&key).await.unwrap());
        assert!(!cache.geo_remove(INDEX, &key).await.unwrap());
        assert!(cache.get_record(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_geo_upsert_rejects_polar_points() {
        let cache = InMemoryListingCache::new();
        let err = cache
            .geo_upsert(INDEX, &CacheKey::from_stored("p"), Coordinates::new(0.0, 86.0))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_search_orders_and_filters() {
        let cache = InMemoryListingCache::new();
        let center = Coordinates::new(-73.9, 40.73);
        for (name, miles) in [("far", 3.0), ("near", 0.5), ("mid", 1.5), ("out", 12.0)] {
            cache
                .geo_upsert(
                    INDEX,
                    &CacheKey::from_stored(name),
                    offset_north(center, miles, DistanceUnit::Miles),
                )
                .await
                .unwrap();
        }

        let hits = cache
            .geo_search(INDEX, &RadiusQuery::new(center, 5.0))
            .await
            .unwrap();
        let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["near", "mid", "far"]);
        assert_eq!(hits[0].distance, 0.5);

        let hits = cache
            .geo_search(
                INDEX,
                &RadiusQuery::new(center, 5.0)
                    .with_order(SortOrder::Descending)
                    .with_limit(2),
            )
            .await
            .unwrap();
        let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["far", "mid"]);
    }

    #[tokio::test]
    async fn test_search_ties_keep_insertion_order() {
        let cache = InMemoryListingCache::new();
        let point = Coordinates::new(-73.9, 40.73);
        for name in ["first", "second", "third"] {
            cache
                .geo_upsert(INDEX, &CacheKey::from_stored(name), point)
                .await
                .unwrap();
        }
        // Re-adding keeps the original slot.
        cache
            .geo_upsert(INDEX, &CacheKey::from_stored("first"), point)
            .await
            .unwrap();

        let hits = cache
            .geo_search(INDEX, &RadiusQuery::new(point, 1.0))
            .await
            .unwrap();
        let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_search_in_kilometers() {
        let cache = InMemoryListingCache::new();
        let center = Coordinates::new(2.35, 48.85);
        cache
            .geo_upsert(
                INDEX,
                &CacheKey::from_stored("k"),
                offset_north(center, 2.0, DistanceUnit::Kilometers),
            )
            .await
            .unwrap();

        let hits = cache
            .geo_search(
                INDEX,
                &RadiusQuery::new(center, 3.0).with_unit(DistanceUnit::Kilometers),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].distance, 2.0);
    }

    #[tokio::test]
    async fn test_unknown_index_is_empty() {
        let cache = InMemoryListingCache::new();
        let hits = cache
            .geo_search("nope", &RadiusQuery::new(Coordinates::new(0.0, 0.0), 25.0))
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert!(cache.geo_members("nope").await.unwrap().is_empty());
    }
}
