//! Change processor: drives a change-stream batch through the codec, the
//! projector and the index maintainer.
//!
//! Records are handled one at a time, in delivery order. A record that cannot
//! be decoded is logged and dropped without touching the rest of the batch. A
//! store failure stops the batch and is returned to the caller, which leaves
//! the batch unacknowledged so the delivery layer sends it again; every write
//! is idempotent, so replaying the already-applied prefix is harmless.

use std::sync::Arc;

use listcache_core::{ChangeEvent, RecordCodec, StreamBatch, StreamRecord, SyncError};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::geo_index::GeoIndexMaintainer;
use crate::projector::{CacheProjector, ProjectionOutcome};
use crate::traits::ListingCache;

/// A record left out of the cache because it could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DroppedRecord {
    /// Event id or sequence number, `-` when the record carries neither.
    pub trace_id: String,
    pub reason: String,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BatchReport {
    /// Records in the batch, dropped ones included.
    pub processed: usize,
    pub upserted: usize,
    pub removed: usize,
    pub dropped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_records: Vec<DroppedRecord>,
}

impl BatchReport {
    pub fn message(&self) -> String {
        format!("Successfully processed {} records.", self.processed)
    }
}

/// Applies change-stream batches to the cache.
#[derive(Debug, Clone)]
pub struct ChangeProcessor {
    codec: RecordCodec,
    projector: CacheProjector,
    index: GeoIndexMaintainer,
}

impl ChangeProcessor {
    pub fn new(codec: RecordCodec, projector: CacheProjector, index: GeoIndexMaintainer) -> Self {
        Self {
            codec,
            projector,
            index,
        }
    }

    /// Build the projector and the index maintainer over one shared store.
    pub fn with_cache(
        codec: RecordCodec,
        cache: Arc<dyn ListingCache>,
        index_key: impl Into<String>,
    ) -> Self {
        Self::new(
            codec,
            CacheProjector::new(cache.clone()),
            GeoIndexMaintainer::new(cache, index_key),
        )
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    pub fn index(&self) -> &GeoIndexMaintainer {
        &self.index
    }

    /// Process every record of `batch` in order.
    pub async fn process_batch(&self, batch: &StreamBatch) -> Result<BatchReport, SyncError> {
        let mut report = BatchReport {
            processed: batch.len(),
            ..BatchReport::default()
        };

        for raw in &batch.records {
            let event = match self.decode(raw) {
                Ok(event) => event,
                Err(dropped) => {
                    error!(
                        trace_id = %dropped.trace_id,
                        reason = %dropped.reason,
                        "Dropping malformed change record"
                    );
                    report.dropped += 1;
                    report.dropped_records.push(dropped);
                    continue;
                }
            };

            self.apply_event(&event).await?;
            match event {
                ChangeEvent::Upsert { .. } => report.upserted += 1,
                ChangeEvent::Remove { .. } => report.removed += 1,
            }
        }

        info!(
            processed = report.processed,
            upserted = report.upserted,
            removed = report.removed,
            dropped = report.dropped,
            "Batch applied"
        );
        Ok(report)
    }

    fn decode(&self, raw: &serde_json::Value) -> Result<ChangeEvent, DroppedRecord> {
        let record = StreamRecord::from_value(raw.clone()).map_err(|e| DroppedRecord {
            trace_id: raw_trace_id(raw),
            reason: e.to_string(),
        })?;
        self.codec
            .decode_record(&record)
            .map_err(|e| DroppedRecord {
                trace_id: record.trace_id().to_string(),
                reason: e.to_string(),
            })
    }

    /// Apply one decoded event: primary projection first, then the index.
    pub async fn apply_event(&self, event: &ChangeEvent) -> Result<ProjectionOutcome, SyncError> {
        let key = event.key();
        let operation = event.operation();

        let outcome = self
            .projector
            .apply(event)
            .await
            .map_err(|source| SyncError::Projection {
                key: key.clone(),
                operation,
                source,
            })?;

        if let Err(source) = self.index.apply(event).await {
            warn!(
                key = %key,
                operation = %operation,
                error = %source,
                "Index lags primary projection until redelivery or reconcile"
            );
            return Err(SyncError::Index {
                key: key.clone(),
                operation,
                source,
            });
        }

        info!(key = %key, operation = %operation, "Applied change event");
        Ok(outcome)
    }
}

/// Best-effort trace id for a record that did not even parse.
fn raw_trace_id(raw: &serde_json::Value) -> String {
    raw.get("eventID")
        .and_then(|v| v.as_str())
        .or_else(|| {
            raw.pointer("/dynamodb/SequenceNumber")
                .and_then(|v| v.as_str())
        })
        .unwrap_or("-")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryListingCache;
    use listcache_core::CacheKey;
    use serde_json::json;

    const INDEX: &str = "properties:geo";

    fn processor() -> (Arc<InMemoryListingCache>, ChangeProcessor) {
        let cache = Arc::new(InMemoryListingCache::new());
        let processor = ChangeProcessor::with_cache(RecordCodec::default(), cache.clone(), INDEX);
        (cache, processor)
    }

    fn batch(records: Vec<serde_json::Value>) -> StreamBatch {
        StreamBatch { records }
    }

    fn insert(pk: &str, sk: &str) -> serde_json::Value {
        json!({
            "eventID": format!("{}-{}", pk, sk),
            "eventName": "INSERT",
            "dynamodb": {"NewImage": {
                "pk": {"S": pk}, "sk": {"S": sk},
                "latitude": {"S": "40.73"}, "longitude": {"S": "-73.9"}
            }}
        })
    }

    #[test]
    fn test_report_message() {
        let report = BatchReport {
            processed: 3,
            ..BatchReport::default()
        };
        assert_eq!(report.message(), "Successfully processed 3 records.");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (_, processor) = processor();
        let report = processor.process_batch(&StreamBatch::default()).await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.message(), "Successfully processed 0 records.");
    }

    #[tokio::test]
    async fn test_malformed_record_does_not_abort_batch() {
        let (cache, processor) = processor();
        let report = processor
            .process_batch(&batch(vec![
                insert("AG1", "AGT1"),
                json!({"eventID": "bad-1", "eventName": "INSERT",
                       "dynamodb": {"NewImage": {"pk": {"S": "AG2"}}}}),
                json!("not an object"),
                insert("AG3", "AGT3"),
            ]))
            .await
            .unwrap();

        assert_eq!(report.processed, 4);
        assert_eq!(report.upserted, 2);
        assert_eq!(report.dropped, 2);
        assert_eq!(report.dropped_records[0].trace_id, "bad-1");
        assert_eq!(report.dropped_records[1].trace_id, "-");
        assert_eq!(cache.record_count().await, 2);
        assert_eq!(cache.index_len(INDEX).await, 2);
    }

    #[tokio::test]
    async fn test_remove_clears_record_and_index() {
        let (cache, processor) = processor();
        processor
            .process_batch(&batch(vec![insert("AG1", "AGT1")]))
            .await
            .unwrap();
        let report = processor
            .process_batch(&batch(vec![json!({
                "eventName": "REMOVE",
                "dynamodb": {"OldImage": {"pk": {"S": "AG1"}, "sk": {"S": "AGT1"}}}
            })]))
            .await
            .unwrap();

        assert_eq!(report.removed, 1);
        let key = CacheKey::from_stored("AG1#AGT1");
        assert!(cache.get_record(&key).await.unwrap().is_empty());
        assert_eq!(cache.index_len(INDEX).await, 0);
    }
}
