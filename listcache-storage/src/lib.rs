//! listcache Storage - Cache Projection, Geospatial Index and Queries
//!
//! Everything that touches the cache store lives here: the store trait and
//! its backends, the projector and index maintainer that apply change
//! events, the batch processor that drives them, the query engine, and the
//! reconciler that repairs drift between the records and the index.

pub mod backends;
pub mod geo_index;
pub mod projector;
pub mod query;
pub mod repair;
pub mod sync;
pub mod traits;

pub use backends::InMemoryListingCache;
#[cfg(feature = "redis-backend")]
pub use backends::{redact_url, RedisListingCache, RedisSettings};
pub use geo_index::{GeoIndexMaintainer, DEFAULT_GEO_INDEX_KEY};
pub use projector::{CacheProjector, ProjectionOutcome};
pub use query::{QueryDefaults, QueryEngine, SearchParams};
pub use repair::{IndexReconciler, ReconcileReport};
pub use sync::{BatchReport, ChangeProcessor, DroppedRecord};
pub use traits::{ListingCache, StorageResult};
