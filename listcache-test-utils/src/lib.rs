//! listcache Test Utilities
//!
//! Shared test infrastructure for the listcache workspace:
//! - A fault-injecting cache wrapper
//! - Proptest generators for coordinates, identities and wire values
//! - Change-stream fixtures
//! - Assertions for search results and index parity

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

pub use listcache_core::{
    CacheKey, Coordinates, DistanceUnit, GeoMatch, PropertyRecord, RadiusQuery, StorageError,
    StreamBatch,
};
pub use listcache_storage::{InMemoryListingCache, ListingCache, StorageResult};

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// Cache wrapper that fails selected writes on demand.
///
/// Primary-record writes and index writes are switched independently, so a
/// test can make exactly one half of an event's work fail. Failures surface
/// as [`StorageError::Unavailable`], the transient kind.
#[derive(Debug)]
pub struct FlakyCache {
    inner: Arc<dyn ListingCache>,
    fail_primary: AtomicBool,
    fail_index: AtomicBool,
    fail_reads: AtomicBool,
    injected: AtomicUsize,
}

impl FlakyCache {
    pub fn new(inner: Arc<dyn ListingCache>) -> Self {
        Self {
            inner,
            fail_primary: AtomicBool::new(false),
            fail_index: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            injected: AtomicUsize::new(0),
        }
    }

    /// Wrap a fresh in-memory cache.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryListingCache::new()))
    }

    pub fn fail_primary_writes(&self, fail: bool) {
        self.fail_primary.store(fail, Ordering::SeqCst);
    }

    pub fn fail_index_writes(&self, fail: bool) {
        self.fail_index.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_primary_writes(false);
        self.fail_index_writes(false);
        self.fail_reads(false);
    }

    /// Number of failures injected so far.
    pub fn injected_failures(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &Arc<dyn ListingCache> {
        &self.inner
    }

    fn check(&self, flag: &AtomicBool, operation: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Unavailable {
                operation: operation.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ListingCache for FlakyCache {
    async fn replace_record(&self, key: &CacheKey, record: &PropertyRecord) -> StorageResult<()> {
        self.check(&self.fail_primary, "DEL+HSET")?;
        self.inner.replace_record(key, record).await
    }

    async fn delete_record(&self, key: &CacheKey) -> StorageResult<bool> {
        self.check(&self.fail_primary, "DEL")?;
        self.inner.delete_record(key).await
    }

    async fn get_record(&self, key: &CacheKey) -> StorageResult<BTreeMap<String, String>> {
        self.check(&self.fail_reads, "HGETALL")?;
        self.inner.get_record(key).await
    }

    async fn geo_upsert(
        &self,
        index: &str,
        key: &CacheKey,
        location: Coordinates,
    ) -> StorageResult<()> {
        self.check(&self.fail_index, "GEOADD")?;
        self.inner.geo_upsert(index, key, location).await
    }

    async fn geo_remove(&self, index: &str, key: &CacheKey) -> StorageResult<bool> {
        self.check(&self.fail_index, "ZREM")?;
        self.inner.geo_remove(index, key).await
    }

    async fn geo_position(
        &self,
        index: &str,
        key: &CacheKey,
    ) -> StorageResult<Option<Coordinates>> {
        self.check(&self.fail_reads, "GEOPOS")?;
        self.inner.geo_position(index, key).await
    }

    async fn geo_search(&self, index: &str, query: &RadiusQuery) -> StorageResult<Vec<GeoMatch>> {
        self.check(&self.fail_reads, "GEOSEARCH")?;
        self.inner.geo_search(index, query).await
    }

    async fn record_keys(&self) -> StorageResult<Vec<CacheKey>> {
        self.check(&self.fail_reads, "SCAN")?;
        self.inner.record_keys().await
    }

    async fn geo_members(&self, index: &str) -> StorageResult<Vec<CacheKey>> {
        self.check(&self.fail_reads, "ZRANGE")?;
        self.inner.geo_members(index).await
    }

    async fn health_check(&self) -> StorageResult<bool> {
        self.check(&self.fail_reads, "PING")?;
        self.inner.health_check().await
    }

    fn provider_name(&self) -> &'static str {
        "flaky"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for listcache inputs.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// Generate a point within `spread` degrees of `center`.
    pub fn arb_coordinates_near(
        center: Coordinates,
        spread: f64,
    ) -> impl Strategy<Value = Coordinates> {
        (-spread..=spread, -spread..=spread).prop_map(move |(dlon, dlat)| {
            Coordinates::new(center.longitude + dlon, center.latitude + dlat)
        })
    }

    /// Generate a point in and around New York City.
    pub fn arb_nyc_coordinates() -> impl Strategy<Value = Coordinates> {
        arb_coordinates_near(fixtures::nyc_center(), 0.5)
    }

    /// Generate any point the geospatial index can store.
    pub fn arb_indexable_coordinates() -> impl Strategy<Value = Coordinates> {
        (-180.0..=180.0f64, -85.0..=85.0f64)
            .prop_map(|(longitude, latitude)| Coordinates::new(longitude, latitude))
    }

    /// Generate a non-empty identity component.
    pub fn arb_identity_component() -> impl Strategy<Value = String> {
        "[A-Z]{2,3}[0-9]{1,4}"
    }

    /// Generate a (partition, sort) identity pair.
    pub fn arb_identity() -> impl Strategy<Value = (String, String)> {
        (arb_identity_component(), arb_identity_component())
    }

    /// Generate a positive search radius with at most four decimals, the
    /// precision distances are reported at.
    pub fn arb_radius() -> impl Strategy<Value = f64> {
        (1u32..1_000_000).prop_map(|n| n as f64 / 10_000.0)
    }

    /// Generate a distance unit.
    pub fn arb_distance_unit() -> impl Strategy<Value = DistanceUnit> {
        prop_oneof![
            Just(DistanceUnit::Meters),
            Just(DistanceUnit::Kilometers),
            Just(DistanceUnit::Miles),
            Just(DistanceUnit::Feet),
        ]
    }

    /// Generate a typed scalar wire value together with the text the cache
    /// should hold for it.
    pub fn arb_wire_scalar() -> impl Strategy<Value = (Value, String)> {
        prop_oneof![
            "[a-zA-Z0-9 ,.-]{0,24}".prop_map(|s| (json!({"S": s.clone()}), s)),
            (-1_000_000i64..1_000_000).prop_map(|n| (json!({"N": n.to_string()}), n.to_string())),
            (0u32..100_000, 0u32..100).prop_map(|(whole, cents)| {
                let text = format!("{}.{:02}", whole, cents);
                (json!({"N": text.clone()}), text)
            }),
            any::<bool>().prop_map(|b| {
                let text = if b { "True" } else { "False" };
                (json!({"BOOL": b}), text.to_string())
            }),
        ]
    }

    /// Generate extra listing attributes (never identity or coordinates).
    pub fn arb_attributes() -> impl Strategy<Value = BTreeMap<String, (Value, String)>> {
        prop::collection::btree_map("attr_[a-z]{1,8}", arb_wire_scalar(), 0..6)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Change-stream records and batches for common scenarios.

    use super::*;
    use serde_json::{json, Map, Value};

    /// Index key used by tests.
    pub const TEST_INDEX: &str = "properties:geo";

    pub fn nyc_center() -> Coordinates {
        Coordinates::new(-73.935242, 40.730610)
    }

    /// A typed listing snapshot with the usual attributes.
    pub fn listing_image(pk: &str, sk: &str, location: Coordinates) -> Value {
        json!({
            "pk": {"S": pk},
            "sk": {"S": sk},
            "latitude": {"S": location.latitude.to_string()},
            "longitude": {"S": location.longitude.to_string()},
            "price": {"N": "1200.50"},
            "bedrooms": {"N": "2"},
            "pet_friendly": {"BOOL": true},
            "address": {"S": "100 Main St"}
        })
    }

    /// A snapshot holding only the identity and coordinates plus `extra`,
    /// given as already-typed wire values.
    pub fn bare_image(
        pk: &str,
        sk: &str,
        location: Coordinates,
        extra: impl IntoIterator<Item = (String, Value)>,
    ) -> Value {
        let mut image = Map::new();
        image.insert("pk".to_string(), json!({"S": pk}));
        image.insert("sk".to_string(), json!({"S": sk}));
        image.insert(
            "latitude".to_string(),
            json!({"S": location.latitude.to_string()}),
        );
        image.insert(
            "longitude".to_string(),
            json!({"S": location.longitude.to_string()}),
        );
        for (name, value) in extra {
            image.insert(name, value);
        }
        Value::Object(image)
    }

    pub fn stream_record(event_name: &str, images: Value) -> Value {
        json!({
            "eventID": format!("evt-{}", event_name.to_lowercase()),
            "eventName": event_name,
            "dynamodb": images
        })
    }

    pub fn insert_record(pk: &str, sk: &str, location: Coordinates) -> Value {
        stream_record(
            "INSERT",
            json!({"NewImage": listing_image(pk, sk, location)}),
        )
    }

    pub fn modify_record(pk: &str, sk: &str, old: Coordinates, new: Coordinates) -> Value {
        stream_record(
            "MODIFY",
            json!({
                "OldImage": listing_image(pk, sk, old),
                "NewImage": listing_image(pk, sk, new)
            }),
        )
    }

    pub fn upsert_record(event_name: &str, image: Value) -> Value {
        stream_record(event_name, json!({ "NewImage": image }))
    }

    pub fn remove_record(pk: &str, sk: &str, location: Coordinates) -> Value {
        stream_record(
            "REMOVE",
            json!({"OldImage": listing_image(pk, sk, location)}),
        )
    }

    pub fn stream_batch(records: impl IntoIterator<Item = Value>) -> StreamBatch {
        StreamBatch {
            records: records.into_iter().collect(),
        }
    }

    pub fn cache_key(pk: &str, sk: &str) -> CacheKey {
        CacheKey::from_identity(pk, sk, listcache_core::DEFAULT_KEY_DELIMITER)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for search results and cache state.

    use super::*;

    /// Assert that result distances never decrease.
    #[track_caller]
    pub fn assert_distances_non_decreasing(matches: &[GeoMatch]) {
        for pair in matches.windows(2) {
            assert!(
                pair[0].distance <= pair[1].distance,
                "Distances out of order: {} ({}) before {} ({})",
                pair[0].key,
                pair[0].distance,
                pair[1].key,
                pair[1].distance
            );
        }
    }

    /// Assert that no result lies beyond `radius`.
    #[track_caller]
    pub fn assert_within_radius(matches: &[GeoMatch], radius: f64) {
        for m in matches {
            assert!(
                m.distance <= radius,
                "{} at {} exceeds radius {}",
                m.key,
                m.distance,
                radius
            );
        }
    }

    /// Assert that every record has an index entry and the other way round.
    pub async fn assert_index_parity(cache: &dyn ListingCache, index: &str) {
        let records = cache.record_keys().await.expect("record keys");
        let members = cache.geo_members(index).await.expect("index members");
        assert_eq!(records, members, "Primary records and index entries diverge");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use listcache_core::{ChangeEvent, RecordCodec};
    use proptest::prelude::*;

    #[test]
    fn test_insert_fixture_decodes() {
        let codec = RecordCodec::default();
        let event = codec
            .decode_value(fixtures::insert_record("AG1", "AGT1", fixtures::nyc_center()))
            .unwrap();
        match event {
            ChangeEvent::Upsert { key, record, .. } => {
                assert_eq!(key, fixtures::cache_key("AG1", "AGT1"));
                assert_eq!(
                    record.get("pet_friendly").map(|v| v.as_cache_str()),
                    Some("True")
                );
            }
            other => panic!("expected upsert, got {:?}", other),
        }
    }

    #[test]
    fn test_remove_fixture_decodes() {
        let codec = RecordCodec::default();
        let event = codec
            .decode_value(fixtures::remove_record("AG1", "AGT1", fixtures::nyc_center()))
            .unwrap();
        assert!(matches!(event, ChangeEvent::Remove { .. }));
    }

    #[tokio::test]
    async fn test_flaky_cache_fails_only_selected_half() {
        let cache = FlakyCache::in_memory();
        let key = fixtures::cache_key("a", "b");

        cache.fail_index_writes(true);
        cache
            .replace_record(&key, &PropertyRecord::new())
            .await
            .unwrap();
        let err = cache
            .geo_upsert(fixtures::TEST_INDEX, &key, fixtures::nyc_center())
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(cache.injected_failures(), 1);

        cache.heal();
        cache
            .geo_upsert(fixtures::TEST_INDEX, &key, fixtures::nyc_center())
            .await
            .unwrap();
        assertions::assert_index_parity(&cache, fixtures::TEST_INDEX).await;
    }

    proptest! {
        #[test]
        fn prop_nyc_coordinates_are_indexable(c in generators::arb_nyc_coordinates()) {
            prop_assert!(c.is_indexable());
        }

        #[test]
        fn prop_identity_components_non_empty((pk, sk) in generators::arb_identity()) {
            prop_assert!(!pk.is_empty());
            prop_assert!(!sk.is_empty());
        }
    }
}
