//! Cache projector: applies decoded change events to the primary records.
//!
//! Insert and modify are unconditional full replaces; remove is an
//! unconditional delete. Both are safe to repeat, which is what makes
//! at-least-once redelivery of a batch harmless.

use std::sync::Arc;

use listcache_core::{CacheKey, ChangeEvent, PropertyRecord};
use tracing::debug;

use crate::traits::{ListingCache, StorageResult};

/// What the projector did for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// The record was written in full.
    Replaced,
    /// A record was present and has been deleted.
    Deleted,
    /// Nothing was stored under the key; the delete was a no-op.
    AlreadyAbsent,
}

/// Writes decoded change events to the primary projection.
#[derive(Debug, Clone)]
pub struct CacheProjector {
    cache: Arc<dyn ListingCache>,
}

impl CacheProjector {
    pub fn new(cache: Arc<dyn ListingCache>) -> Self {
        Self { cache }
    }

    /// Apply one event to the primary projection.
    pub async fn apply(&self, event: &ChangeEvent) -> StorageResult<ProjectionOutcome> {
        match event {
            ChangeEvent::Upsert { key, record, .. } => self.replace(key, record).await,
            ChangeEvent::Remove { key } => self.delete(key).await,
        }
    }

    pub async fn replace(
        &self,
        key: &CacheKey,
        record: &PropertyRecord,
    ) -> StorageResult<ProjectionOutcome> {
        self.cache.replace_record(key, record).await?;
        debug!(key = %key, attributes = record.len(), "Projected record");
        Ok(ProjectionOutcome::Replaced)
    }

    pub async fn delete(&self, key: &CacheKey) -> StorageResult<ProjectionOutcome> {
        if self.cache.delete_record(key).await? {
            debug!(key = %key, "Deleted record");
            Ok(ProjectionOutcome::Deleted)
        } else {
            debug!(key = %key, "Delete of absent record ignored");
            Ok(ProjectionOutcome::AlreadyAbsent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryListingCache;
    use listcache_core::{AttributeValue, ChangeOperation, Coordinates};

    fn upsert(key: &str, price: &str) -> ChangeEvent {
        ChangeEvent::Upsert {
            operation: ChangeOperation::Modify,
            key: CacheKey::from_stored(key),
            record: [("price".to_string(), AttributeValue::Number(price.to_string()))]
                .into_iter()
                .collect(),
            location: Coordinates::new(-73.9, 40.73),
        }
    }

    #[tokio::test]
    async fn test_upsert_twice_is_idempotent() {
        let cache = Arc::new(InMemoryListingCache::new());
        let projector = CacheProjector::new(cache.clone());
        let event = upsert("AG1#AGT1", "1000");

        assert_eq!(projector.apply(&event).await.unwrap(), ProjectionOutcome::Replaced);
        let once = cache.get_record(event.key()).await.unwrap();
        projector.apply(&event).await.unwrap();
        assert_eq!(cache.get_record(event.key()).await.unwrap(), once);
    }

    #[tokio::test]
    async fn test_remove_reports_absence() {
        let cache = Arc::new(InMemoryListingCache::new());
        let projector = CacheProjector::new(cache.clone());
        projector.apply(&upsert("a#b", "1")).await.unwrap();

        let remove = ChangeEvent::Remove {
            key: CacheKey::from_stored("a#b"),
        };
        assert_eq!(projector.apply(&remove).await.unwrap(), ProjectionOutcome::Deleted);
        assert_eq!(
            projector.apply(&remove).await.unwrap(),
            ProjectionOutcome::AlreadyAbsent
        );
        assert_eq!(cache.record_count().await, 0);
    }
}
