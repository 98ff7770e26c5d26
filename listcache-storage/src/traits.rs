//! Cache store trait.
//!
//! The store holds two structures: one hash of text attributes per cache key
//! (the primary projection) and a named geospatial index of cache keys. Every
//! method is a single primitive the store applies atomically for one key;
//! there is no multi-key transaction anywhere in this trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use listcache_core::{CacheKey, Coordinates, GeoMatch, PropertyRecord, RadiusQuery, StorageError};

/// Result type for cache store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Pluggable cache store.
///
/// Implemented by the Redis backend and by the in-memory backend used in
/// tests and local development. Implementations must be safe to share across
/// concurrent batch and query invocations.
#[async_trait]
pub trait ListingCache: Send + Sync {
    /// Replace every attribute stored under `key` with `record`.
    ///
    /// Fields absent from `record` do not survive. Applying the same record
    /// twice leaves the same state as applying it once.
    async fn replace_record(&self, key: &CacheKey, record: &PropertyRecord) -> StorageResult<()>;

    /// Delete the record under `key`. Returns whether a record was there.
    ///
    /// Deleting an absent key is not an error.
    async fn delete_record(&self, key: &CacheKey) -> StorageResult<bool>;

    /// All attributes stored under `key`; empty when the key is absent.
    async fn get_record(&self, key: &CacheKey) -> StorageResult<BTreeMap<String, String>>;

    /// Add `key` to the index at `location`, replacing any previous position.
    async fn geo_upsert(&self, index: &str, key: &CacheKey, location: Coordinates)
        -> StorageResult<()>;

    /// Remove `key` from the index. Returns whether an entry was there.
    async fn geo_remove(&self, index: &str, key: &CacheKey) -> StorageResult<bool>;

    /// Position of `key` in the index, if indexed.
    async fn geo_position(&self, index: &str, key: &CacheKey)
        -> StorageResult<Option<Coordinates>>;

    /// Indexed keys within the query radius, ordered by distance.
    ///
    /// Read-only. An empty result is a normal outcome.
    async fn geo_search(&self, index: &str, query: &RadiusQuery) -> StorageResult<Vec<GeoMatch>>;

    /// Keys of every stored record.
    async fn record_keys(&self) -> StorageResult<Vec<CacheKey>>;

    /// Every key held by the index.
    async fn geo_members(&self, index: &str) -> StorageResult<Vec<CacheKey>>;

    /// Check if the store is reachable.
    async fn health_check(&self) -> StorageResult<bool>;

    /// Name of the backend, for logs and health output.
    fn provider_name(&self) -> &'static str;
}

impl std::fmt::Debug for dyn ListingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.provider_name())
    }
}
