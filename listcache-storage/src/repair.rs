//! Index reconciliation.
//!
//! Closes the gap left when one of the two writes for an event failed and
//! the event was never redelivered. Records without an index entry are
//! re-indexed from their stored coordinates; index entries without a record
//! are removed. Running it twice in a row changes nothing the second time.

use std::collections::BTreeSet;
use std::sync::Arc;

use listcache_core::{location_of, AttributeValue, CacheKey, PropertyRecord};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::geo_index::GeoIndexMaintainer;
use crate::traits::{ListingCache, StorageResult};

/// What a reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReconcileReport {
    pub records_scanned: usize,
    pub index_entries_scanned: usize,
    /// Records that were missing from the index and have been added.
    pub reindexed: Vec<CacheKey>,
    /// Index entries that pointed at no record and have been removed.
    pub orphans_removed: Vec<CacheKey>,
    /// Records missing from the index whose stored coordinates are unusable.
    pub unrepairable: Vec<CacheKey>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.reindexed.is_empty() && self.orphans_removed.is_empty() && self.unrepairable.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct IndexReconciler {
    cache: Arc<dyn ListingCache>,
    index: GeoIndexMaintainer,
}

impl IndexReconciler {
    pub fn new(cache: Arc<dyn ListingCache>, index_key: impl Into<String>) -> Self {
        Self {
            index: GeoIndexMaintainer::new(cache.clone(), index_key),
            cache,
        }
    }

    pub async fn reconcile(&self) -> StorageResult<ReconcileReport> {
        let records: BTreeSet<CacheKey> = self.cache.record_keys().await?.into_iter().collect();
        let indexed: BTreeSet<CacheKey> = self.index.members().await?.into_iter().collect();

        let mut report = ReconcileReport {
            records_scanned: records.len(),
            index_entries_scanned: indexed.len(),
            ..ReconcileReport::default()
        };

        for key in records.difference(&indexed) {
            let stored = self.cache.get_record(key).await?;
            // Deleted between the scan and the read.
            if stored.is_empty() {
                continue;
            }
            let record: PropertyRecord = stored
                .into_iter()
                .map(|(name, value)| (name, AttributeValue::Text(value)))
                .collect();
            match location_of(&record) {
                Ok(location) => {
                    self.index.place(key, location).await?;
                    report.reindexed.push(key.clone());
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Record cannot be indexed");
                    report.unrepairable.push(key.clone());
                }
            }
        }

        for key in indexed.difference(&records) {
            // Written after the record scan.
            if !self.cache.get_record(key).await?.is_empty() {
                continue;
            }
            self.index.remove(key).await?;
            report.orphans_removed.push(key.clone());
        }

        info!(
            records = report.records_scanned,
            index_entries = report.index_entries_scanned,
            reindexed = report.reindexed.len(),
            orphans_removed = report.orphans_removed.len(),
            unrepairable = report.unrepairable.len(),
            "Index reconciled"
        );
        Ok(report)
    }
}
