//! Cache projection types: keys, records, coordinates and change events.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geo::MAX_INDEXABLE_LATITUDE;

/// Default partition identity attribute.
pub const DEFAULT_PARTITION_ATTRIBUTE: &str = "pk";

/// Default sort identity attribute.
pub const DEFAULT_SORT_ATTRIBUTE: &str = "sk";

/// Default delimiter joining the identity attributes into a cache key.
pub const DEFAULT_KEY_DELIMITER: &str = "#";

/// Attribute holding the latitude in decimal degrees.
pub const LATITUDE_ATTRIBUTE: &str = "latitude";

/// Attribute holding the longitude in decimal degrees.
pub const LONGITUDE_ATTRIBUTE: &str = "longitude";

// ============================================================================
// CACHE KEY
// ============================================================================

/// Identity of a cached property record.
///
/// Always derived from the record's partition and sort attributes, so the
/// key can be recomputed from any snapshot of the record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Join the identity components with the delimiter.
    pub fn from_identity(partition: &str, sort: &str, delimiter: &str) -> Self {
        Self(format!("{}{}{}", partition, delimiter, sort))
    }

    /// Wrap a key read back from the cache store.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Names of the identity attributes and the delimiter joining them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    pub partition_attribute: String,
    pub sort_attribute: String,
    pub delimiter: String,
}

impl Default for KeySchema {
    fn default() -> Self {
        Self {
            partition_attribute: DEFAULT_PARTITION_ATTRIBUTE.to_string(),
            sort_attribute: DEFAULT_SORT_ATTRIBUTE.to_string(),
            delimiter: DEFAULT_KEY_DELIMITER.to_string(),
        }
    }
}

impl KeySchema {
    pub fn cache_key(&self, partition: &str, sort: &str) -> CacheKey {
        CacheKey::from_identity(partition, sort, &self.delimiter)
    }
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

/// A normalized attribute value.
///
/// There is no boolean variant: the codec renders booleans as text before a
/// record is built, because the cache store has no boolean type. Reading a
/// boolean back out of the text is never attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    /// Decimal number, kept as the text it was delivered with.
    Number(String),
}

impl AttributeValue {
    /// The form the cache store holds.
    pub fn as_cache_str(&self) -> &str {
        match self {
            AttributeValue::Text(s) | AttributeValue::Number(s) => s,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_cache_str())
    }
}

/// Flat attribute mapping of one property listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyRecord {
    attributes: BTreeMap<String, AttributeValue>,
}

impl PropertyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes.iter()
    }

    /// Field/value pairs in the text form written to the cache.
    pub fn to_cache_fields(&self) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.as_cache_str().to_string()))
            .collect()
    }

    /// The attribute map exactly as a detail lookup returns it.
    pub fn to_cache_map(&self) -> BTreeMap<String, String> {
        self.to_cache_fields().into_iter().collect()
    }
}

impl FromIterator<(String, AttributeValue)> for PropertyRecord {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// COORDINATES & UNITS
// ============================================================================

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Whether the geospatial index can store this point.
    ///
    /// The index encodes points as geohashes, which cannot represent the
    /// polar caps beyond +/-85.05112878 degrees latitude.
    pub fn is_indexable(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude)
            && (-MAX_INDEXABLE_LATITUDE..=MAX_INDEXABLE_LATITUDE).contains(&self.latitude)
    }

    /// Check the query-side preconditions on a search center.
    pub fn validate_search_center(&self) -> Result<(), ValidationError> {
        check_range("lon", self.longitude, -180.0, 180.0)?;
        check_range("lat", self.latitude, -90.0, 90.0)
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
            value,
        });
    }
    Ok(())
}

/// Distance units understood by radius search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum DistanceUnit {
    #[serde(rename = "m")]
    Meters,
    #[serde(rename = "km")]
    Kilometers,
    #[default]
    #[serde(rename = "mi")]
    Miles,
    #[serde(rename = "ft")]
    Feet,
}

impl DistanceUnit {
    /// Conversion factor used by the geospatial index.
    pub fn meters_per_unit(&self) -> f64 {
        match self {
            DistanceUnit::Meters => 1.0,
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::Miles => 1609.34,
            DistanceUnit::Feet => 0.3048,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceUnit::Meters => "m",
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
            DistanceUnit::Feet => "ft",
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "m" => Ok(DistanceUnit::Meters),
            "km" => Ok(DistanceUnit::Kilometers),
            "mi" => Ok(DistanceUnit::Miles),
            "ft" => Ok(DistanceUnit::Feet),
            other => Err(ValidationError::InvalidValue {
                field: "unit".to_string(),
                reason: format!("unknown distance unit '{}', expected m, km, mi or ft", other),
            }),
        }
    }
}

/// Result ordering for radius search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum SortOrder {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Ascending,
    #[serde(rename = "DESC", alias = "desc")]
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

// ============================================================================
// QUERIES & MATCHES
// ============================================================================

/// One radius search request against the geospatial index.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusQuery {
    pub center: Coordinates,
    pub radius: f64,
    pub unit: DistanceUnit,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl RadiusQuery {
    pub fn new(center: Coordinates, radius: f64) -> Self {
        Self {
            center,
            radius,
            unit: DistanceUnit::default(),
            order: SortOrder::default(),
            limit: None,
        }
    }

    pub fn with_unit(mut self, unit: DistanceUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Radius converted to meters.
    pub fn radius_meters(&self) -> f64 {
        self.radius * self.unit.meters_per_unit()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.center.validate_search_center()?;
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(ValidationError::NotPositive {
                field: "radius".to_string(),
                value: self.radius,
            });
        }
        if self.limit == Some(0) {
            return Err(ValidationError::InvalidValue {
                field: "limit".to_string(),
                reason: "must be at least 1 when given".to_string(),
            });
        }
        Ok(())
    }
}

/// A single radius search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GeoMatch {
    pub key: CacheKey,
    pub coordinates: Coordinates,
    /// Great-circle distance from the search center, in the query's unit.
    pub distance: f64,
}

// ============================================================================
// CHANGE EVENTS
// ============================================================================

/// Mutation kind reported by the change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOperation {
    Insert,
    Modify,
    Remove,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Insert => "INSERT",
            ChangeOperation::Modify => "MODIFY",
            ChangeOperation::Remove => "REMOVE",
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded change event, ready to be applied to the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// Insert or modify: replace the record and its index entry.
    Upsert {
        operation: ChangeOperation,
        key: CacheKey,
        record: PropertyRecord,
        location: Coordinates,
    },
    /// Remove the record and its index entry.
    Remove { key: CacheKey },
}

impl ChangeEvent {
    pub fn key(&self) -> &CacheKey {
        match self {
            ChangeEvent::Upsert { key, .. } | ChangeEvent::Remove { key } => key,
        }
    }

    pub fn operation(&self) -> ChangeOperation {
        match self {
            ChangeEvent::Upsert { operation, .. } => *operation,
            ChangeEvent::Remove { .. } => ChangeOperation::Remove,
        }
    }
}
