//! Record codec: typed wire snapshots to flat cache records.
//!
//! # Normalization contract
//!
//! The cache store only holds text, so every decoded value ends up as text:
//!
//! - `S` passes through unchanged.
//! - `N` keeps the decimal text it was delivered with (`"1200.50"` stays
//!   `"1200.50"`).
//! - `BOOL` becomes `"True"` or `"False"`. This is one-way: nothing on the
//!   read path turns the text back into a boolean, and consumers of the cache
//!   already rely on these exact spellings.
//! - `B` is checked to be base64 and kept as base64 text.
//! - Sets, lists and maps become compact JSON text.
//! - `NULL` becomes `"None"`, so a lookup returns every attribute that was
//!   delivered.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::CodecError;
use crate::types::{
    AttributeValue, CacheKey, ChangeEvent, ChangeOperation, Coordinates, KeySchema,
    PropertyRecord, LATITUDE_ATTRIBUTE, LONGITUDE_ATTRIBUTE,
};
use crate::wire::{Snapshot, StreamRecord, WireValue};

/// Text stored for a `NULL` attribute.
pub const NULL_CACHE_TEXT: &str = "None";

/// Render a boolean the way the cache has always stored it.
pub fn bool_to_cache_text(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Decodes change records into [`ChangeEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct RecordCodec {
    schema: KeySchema,
}

impl RecordCodec {
    pub fn new(schema: KeySchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    /// Decode one raw batch entry.
    pub fn decode_value(&self, raw: serde_json::Value) -> Result<ChangeEvent, CodecError> {
        let record = StreamRecord::from_value(raw)?;
        self.decode_record(&record)
    }

    /// Decode a parsed change record.
    ///
    /// Insert and modify read the post-image and need the identity and the
    /// coordinates. Remove reads the pre-image (or the key image when the
    /// stream carries keys only) and needs the identity alone.
    pub fn decode_record(&self, record: &StreamRecord) -> Result<ChangeEvent, CodecError> {
        let operation = record.operation()?;
        match operation {
            ChangeOperation::Insert | ChangeOperation::Modify => {
                let image = record.images.new_image.as_ref().ok_or_else(|| {
                    CodecError::MissingSnapshot {
                        operation: operation.to_string(),
                        image: "NewImage".to_string(),
                    }
                })?;
                let attributes = self.decode_snapshot(image)?;
                let key = self.cache_key(&attributes)?;
                let location = location_of(&attributes)?;
                Ok(ChangeEvent::Upsert {
                    operation,
                    key,
                    record: attributes,
                    location,
                })
            }
            ChangeOperation::Remove => {
                let image = record
                    .images
                    .old_image
                    .as_ref()
                    .or(record.images.keys.as_ref())
                    .ok_or_else(|| CodecError::MissingSnapshot {
                        operation: operation.to_string(),
                        image: "OldImage".to_string(),
                    })?;
                let attributes = self.decode_snapshot(image)?;
                let key = self.cache_key(&attributes)?;
                Ok(ChangeEvent::Remove { key })
            }
        }
    }

    /// Flatten a typed snapshot into a record of native scalars.
    pub fn decode_snapshot(&self, snapshot: &Snapshot) -> Result<PropertyRecord, CodecError> {
        let mut record = PropertyRecord::new();
        for (name, value) in snapshot {
            record.insert(name.clone(), normalize_value(name, value)?);
        }
        Ok(record)
    }

    /// Derive the cache key from the identity attributes.
    pub fn cache_key(&self, record: &PropertyRecord) -> Result<CacheKey, CodecError> {
        let partition = identity_component(record, &self.schema.partition_attribute)?;
        let sort = identity_component(record, &self.schema.sort_attribute)?;
        Ok(self.schema.cache_key(partition, sort))
    }
}

fn identity_component<'a>(
    record: &'a PropertyRecord,
    attribute: &str,
) -> Result<&'a str, CodecError> {
    let value = record
        .get(attribute)
        .ok_or_else(|| CodecError::MissingIdentity {
            attribute: attribute.to_string(),
        })?;
    let text = value.as_cache_str();
    if text.is_empty() {
        return Err(CodecError::EmptyIdentity {
            attribute: attribute.to_string(),
        });
    }
    Ok(text)
}

/// Read the indexable location of a record.
pub fn location_of(record: &PropertyRecord) -> Result<Coordinates, CodecError> {
    let longitude = coordinate(record, LONGITUDE_ATTRIBUTE)?;
    let latitude = coordinate(record, LATITUDE_ATTRIBUTE)?;
    let location = Coordinates::new(longitude, latitude);
    if !location.is_indexable() {
        return Err(CodecError::CoordinatesOutOfRange {
            longitude,
            latitude,
        });
    }
    Ok(location)
}

fn coordinate(record: &PropertyRecord, attribute: &str) -> Result<f64, CodecError> {
    let raw = record
        .get(attribute)
        .ok_or_else(|| CodecError::MissingCoordinate {
            attribute: attribute.to_string(),
        })?
        .as_cache_str();
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CodecError::InvalidCoordinate {
            attribute: attribute.to_string(),
            value: raw.to_string(),
        })
}

/// Normalize one top-level attribute.
pub fn normalize_value(name: &str, value: &WireValue) -> Result<AttributeValue, CodecError> {
    let normalized = match value {
        WireValue::String(s) => AttributeValue::Text(s.clone()),
        WireValue::Number(n) => AttributeValue::Number(checked_number(name, n)?.to_string()),
        WireValue::Bool(b) => AttributeValue::Text(bool_to_cache_text(*b).to_string()),
        WireValue::Null(_) => AttributeValue::Text(NULL_CACHE_TEXT.to_string()),
        WireValue::Binary(b) => AttributeValue::Text(checked_base64(name, b)?),
        WireValue::StringSet(_)
        | WireValue::NumberSet(_)
        | WireValue::BinarySet(_)
        | WireValue::List(_)
        | WireValue::Map(_) => AttributeValue::Text(to_json(name, value)?.to_string()),
    };
    Ok(normalized)
}

fn checked_number<'a>(name: &str, text: &'a str) -> Result<&'a str, CodecError> {
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(trimmed),
        _ => Err(CodecError::MalformedValue {
            attribute: name.to_string(),
            reason: format!("'{}' is not a decimal number", text),
        }),
    }
}

fn checked_base64(name: &str, text: &str) -> Result<String, CodecError> {
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| CodecError::MalformedValue {
            attribute: name.to_string(),
            reason: format!("invalid base64: {}", e),
        })?;
    Ok(STANDARD.encode(bytes))
}

fn json_number(name: &str, text: &str) -> Result<serde_json::Value, CodecError> {
    let checked = checked_number(name, text)?;
    serde_json::from_str::<serde_json::Number>(checked)
        .map(serde_json::Value::Number)
        .or_else(|_| Ok(serde_json::Value::String(checked.to_string())))
}

fn to_json(name: &str, value: &WireValue) -> Result<serde_json::Value, CodecError> {
    use serde_json::Value;

    Ok(match value {
        WireValue::String(s) => Value::String(s.clone()),
        WireValue::Number(n) => json_number(name, n)?,
        WireValue::Bool(b) => Value::Bool(*b),
        WireValue::Null(_) => Value::Null,
        WireValue::Binary(b) => Value::String(checked_base64(name, b)?),
        WireValue::StringSet(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        WireValue::NumberSet(items) => Value::Array(
            items
                .iter()
                .map(|n| json_number(name, n))
                .collect::<Result<_, _>>()?,
        ),
        WireValue::BinarySet(items) => Value::Array(
            items
                .iter()
                .map(|b| checked_base64(name, b).map(Value::String))
                .collect::<Result<_, _>>()?,
        ),
        WireValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| to_json(name, item))
                .collect::<Result<_, _>>()?,
        ),
        WireValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| to_json(name, v).map(|j| (k.clone(), j)))
                .collect::<Result<_, _>>()?,
        ),
    })
}
