//! Error types for listcache operations

use thiserror::Error;

use crate::types::{CacheKey, ChangeOperation};

/// Record codec errors.
///
/// Every variant describes a single malformed change record. The sync path
/// drops the record and keeps going; none of these abort a batch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CodecError {
    #[error("Identity attribute missing: {attribute}")]
    MissingIdentity { attribute: String },

    #[error("Identity attribute {attribute} is empty")]
    EmptyIdentity { attribute: String },

    #[error("Coordinate attribute missing: {attribute}")]
    MissingCoordinate { attribute: String },

    #[error("Coordinate attribute {attribute} is not a decimal degree value: {value}")]
    InvalidCoordinate { attribute: String, value: String },

    #[error("Coordinates out of indexable range: longitude {longitude}, latitude {latitude}")]
    CoordinatesOutOfRange { longitude: f64, latitude: f64 },

    #[error("Unsupported event name: {event_name}")]
    UnsupportedEventName { event_name: String },

    #[error("Change record for {operation} carries no {image} snapshot")]
    MissingSnapshot { operation: String, image: String },

    #[error("Malformed attribute value for {attribute}: {reason}")]
    MalformedValue { attribute: String, reason: String },

    #[error("Malformed change record: {reason}")]
    MalformedRecord { reason: String },
}

/// Cache store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The store could not be reached. Transient; the caller owns the retry.
    #[error("Cache store unavailable during {operation}: {reason}")]
    Unavailable { operation: String, reason: String },

    /// The store answered but refused the command.
    #[error("Cache store rejected {operation}: {reason}")]
    Rejected { operation: String, reason: String },
}

impl StorageError {
    /// Whether redelivering the same work later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}

/// Failure applying a decoded change event to the cache.
///
/// Always caused by the store, never by the event itself. The batch stops at
/// the failing event and is handed back to the delivery layer for redelivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Primary projection failed for {key} ({operation}): {source}")]
    Projection {
        key: CacheKey,
        operation: ChangeOperation,
        #[source]
        source: StorageError,
    },

    /// The primary write went through; the index is behind until the event
    /// is redelivered or the reconciler runs.
    #[error("Geospatial index update failed for {key} ({operation}): {source}")]
    Index {
        key: CacheKey,
        operation: ChangeOperation,
        #[source]
        source: StorageError,
    },
}

impl SyncError {
    pub fn key(&self) -> &CacheKey {
        match self {
            SyncError::Projection { key, .. } | SyncError::Index { key, .. } => key,
        }
    }

    pub fn storage_error(&self) -> &StorageError {
        match self {
            SyncError::Projection { source, .. } | SyncError::Index { source, .. } => source,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.storage_error().is_transient()
    }
}

/// Query validation errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Field {field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("Field {field} must be positive, got {value}")]
    NotPositive { field: String, value: f64 },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Credential resolution failed for {secret_id}: {reason}")]
    CredentialResolution { secret_id: String, reason: String },
}

/// Master error type for all listcache errors.
#[derive(Debug, Clone, Error)]
pub enum ListcacheError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Result type alias for listcache operations.
pub type ListcacheResult<T> = Result<T, ListcacheError>;

// =============================================================================
// TESTS
// =============================================================================
