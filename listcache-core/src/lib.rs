//! listcache Core - Records, Codec and Geodesy
//!
//! Pure data structures and pure functions shared by every other crate:
//! the typed change-stream wire format, the record codec that flattens it
//! into cache records, the cache key, coordinates and great-circle math,
//! and the error taxonomy. Nothing in here performs I/O.

pub mod codec;
pub mod error;
pub mod geo;
pub mod types;
pub mod wire;

pub use codec::{bool_to_cache_text, location_of, normalize_value, RecordCodec, NULL_CACHE_TEXT};
pub use error::{
    CodecError, ConfigError, ListcacheError, ListcacheResult, StorageError, SyncError,
    ValidationError,
};
pub use geo::{
    great_circle_distance, great_circle_meters, offset_north, round_distance,
    EARTH_RADIUS_METERS, MAX_INDEXABLE_LATITUDE,
};
pub use types::{
    AttributeValue, CacheKey, ChangeEvent, ChangeOperation, Coordinates, DistanceUnit, GeoMatch,
    KeySchema, PropertyRecord, RadiusQuery, SortOrder, DEFAULT_KEY_DELIMITER,
    DEFAULT_PARTITION_ATTRIBUTE, DEFAULT_SORT_ATTRIBUTE, LATITUDE_ATTRIBUTE, LONGITUDE_ATTRIBUTE,
};
pub use wire::{Snapshot, StreamBatch, StreamImages, StreamRecord, WireValue};

/// Search radius applied when a caller leaves it out, in the default unit.
pub const DEFAULT_SEARCH_RADIUS: f64 = 25.0;
