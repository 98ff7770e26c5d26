//! Property-based tests for the sync and query paths.
//!
//! - Insert/modify applied twice leaves the same state as applied once
//! - Remove of an absent key is a successful no-op
//! - Insert then detail returns the supplied attributes, booleans as text
//! - After any settled sequence of events, records and index entries match
//! - Radius search results are ordered by distance and stay inside the radius

use std::collections::BTreeMap;
use std::sync::Arc;

use listcache_core::{Coordinates, RecordCodec};
use listcache_storage::{ChangeProcessor, InMemoryListingCache, ListingCache, QueryEngine, SearchParams};
use listcache_test_utils::{assertions, fixtures, generators};
use proptest::prelude::*;
use serde_json::Value;
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn setup() -> (Arc<InMemoryListingCache>, ChangeProcessor, QueryEngine) {
    let cache = Arc::new(InMemoryListingCache::new());
    let processor =
        ChangeProcessor::with_cache(RecordCodec::default(), cache.clone(), fixtures::TEST_INDEX);
    let engine = QueryEngine::new(cache.clone(), fixtures::TEST_INDEX);
    (cache, processor, engine)
}

async fn snapshot(cache: &InMemoryListingCache) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut state = BTreeMap::new();
    for key in cache.record_keys().await.unwrap_or_default() {
        let record = cache.get_record(&key).await.unwrap_or_default();
        state.insert(key.into_string(), record);
    }
    state
}

// ============================================================================
// PROPERTY TEST STRATEGIES
// ============================================================================

/// One event against a small key space, so sequences revisit keys.
#[derive(Debug, Clone)]
enum Op {
    Insert(usize, Coordinates),
    Modify(usize, Coordinates),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..4, generators::arb_nyc_coordinates()).prop_map(|(k, c)| Op::Insert(k, c)),
        (0usize..4, generators::arb_nyc_coordinates()).prop_map(|(k, c)| Op::Modify(k, c)),
        (0usize..4).prop_map(Op::Remove),
    ]
}

fn op_record(op: &Op) -> Value {
    match op {
        Op::Insert(k, c) => fixtures::insert_record("AG1", &format!("K{}", k), *c),
        Op::Modify(k, c) => {
            fixtures::upsert_record("MODIFY", fixtures::listing_image("AG1", &format!("K{}", k), *c))
        }
        Op::Remove(k) => fixtures::remove_record("AG1", &format!("K{}", k), fixtures::nyc_center()),
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_upsert_is_idempotent(
        (pk, sk) in generators::arb_identity(),
        location in generators::arb_indexable_coordinates(),
        modify in any::<bool>(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (cache, processor, _) = setup();
            let event_name = if modify { "MODIFY" } else { "INSERT" };
            let record = fixtures::upsert_record(
                event_name,
                fixtures::listing_image(&pk, &sk, location),
            );

            processor.process_batch(&fixtures::stream_batch([record.clone()])).await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let once = snapshot(&cache).await;
            let index_once = cache.geo_members(fixtures::TEST_INDEX).await.unwrap_or_default();

            processor.process_batch(&fixtures::stream_batch([record])).await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(snapshot(&cache).await, once);
            prop_assert_eq!(
                cache.geo_members(fixtures::TEST_INDEX).await.unwrap_or_default(),
                index_once
            );
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_remove_of_absent_key_is_noop((pk, sk) in generators::arb_identity()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (cache, processor, _) = setup();
            let batch = fixtures::stream_batch([
                fixtures::remove_record(&pk, &sk, fixtures::nyc_center()),
            ]);
            let report = processor.process_batch(&batch).await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(report.removed, 1);
            prop_assert_eq!(report.dropped, 0);
            prop_assert_eq!(cache.record_count().await, 0);
            prop_assert_eq!(cache.index_len(fixtures::TEST_INDEX).await, 0);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_insert_then_detail_round_trips(
        (pk, sk) in generators::arb_identity(),
        location in generators::arb_nyc_coordinates(),
        attributes in generators::arb_attributes(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (_, processor, engine) = setup();
            let image = fixtures::bare_image(
                &pk,
                &sk,
                location,
                attributes.iter().map(|(name, (wire, _))| (name.clone(), wire.clone())),
            );
            processor
                .process_batch(&fixtures::stream_batch([fixtures::upsert_record("INSERT", image)]))
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let mut expected: BTreeMap<String, String> = attributes
                .iter()
                .map(|(name, (_, text))| (name.clone(), text.clone()))
                .collect();
            expected.insert("pk".to_string(), pk.clone());
            expected.insert("sk".to_string(), sk.clone());
            expected.insert("latitude".to_string(), location.latitude.to_string());
            expected.insert("longitude".to_string(), location.longitude.to_string());

            let detail = engine
                .detail(fixtures::cache_key(&pk, &sk).as_str())
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(detail, expected);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_index_parity_after_settling(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (cache, processor, _) = setup();
            let batch = fixtures::stream_batch(ops.iter().map(op_record));
            processor.process_batch(&batch).await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let records = cache.record_keys().await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let members = cache.geo_members(fixtures::TEST_INDEX).await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(records, members);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_radius_results_ordered_and_bounded(
        points in prop::collection::vec(generators::arb_nyc_coordinates(), 0..30),
        center in generators::arb_nyc_coordinates(),
        radius in generators::arb_radius(),
        unit in generators::arb_distance_unit(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (_, processor, engine) = setup();
            let batch = fixtures::stream_batch(
                points
                    .iter()
                    .enumerate()
                    .map(|(i, c)| fixtures::insert_record("AG1", &format!("P{}", i), *c)),
            );
            processor.process_batch(&batch).await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let hits = engine
                .radius_search(
                    &SearchParams::at(center.longitude, center.latitude)
                        .with_radius(radius)
                        .with_unit(unit),
                )
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            assertions::assert_distances_non_decreasing(&hits);
            assertions::assert_within_radius(&hits, radius);
            prop_assert!(hits.len() <= points.len());
            Ok::<(), TestCaseError>(())
        })?;
    }
}
