//! Change-stream wire format.
//!
//! The authoritative store delivers attribute snapshots as typed JSON, where
//! every value is a single-key object naming its type:
//!
//! ```text
//! {"pk": {"S": "AG1"}, "price": {"N": "1200.50"}, "pet_friendly": {"BOOL": true}}
//! ```
//!
//! A batch is decoded in two steps. The envelope is parsed leniently into raw
//! JSON records, then each record is parsed on its own, so one malformed
//! record cannot fail its neighbours.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::types::ChangeOperation;

/// Tagged attribute value as delivered by the change stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    #[serde(rename = "S")]
    String(String),
    #[serde(rename = "N")]
    Number(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    /// Base64 text.
    #[serde(rename = "B")]
    Binary(String),
    #[serde(rename = "SS")]
    StringSet(Vec<String>),
    #[serde(rename = "NS")]
    NumberSet(Vec<String>),
    #[serde(rename = "BS")]
    BinarySet(Vec<String>),
    #[serde(rename = "L")]
    List(Vec<WireValue>),
    #[serde(rename = "M")]
    Map(BTreeMap<String, WireValue>),
}

impl WireValue {
    /// The wire type tag.
    pub fn type_tag(&self) -> &'static str {
        match self {
            WireValue::String(_) => "S",
            WireValue::Number(_) => "N",
            WireValue::Bool(_) => "BOOL",
            WireValue::Null(_) => "NULL",
            WireValue::Binary(_) => "B",
            WireValue::StringSet(_) => "SS",
            WireValue::NumberSet(_) => "NS",
            WireValue::BinarySet(_) => "BS",
            WireValue::List(_) => "L",
            WireValue::Map(_) => "M",
        }
    }
}

/// Attribute snapshot of one record.
pub type Snapshot = BTreeMap<String, WireValue>;

/// Before/after images carried by a change record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamImages {
    #[serde(rename = "Keys", default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Snapshot>,
    #[serde(rename = "NewImage", default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Snapshot>,
    #[serde(rename = "OldImage", default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Snapshot>,
    #[serde(
        rename = "SequenceNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence_number: Option<String>,
}

/// One change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(rename = "dynamodb", default)]
    pub images: StreamImages,
}

impl StreamRecord {
    /// Parse one raw record from a batch.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CodecError> {
        serde_json::from_value(value).map_err(|e| CodecError::MalformedRecord {
            reason: e.to_string(),
        })
    }

    /// The mutation kind named by `eventName`.
    pub fn operation(&self) -> Result<ChangeOperation, CodecError> {
        match self.event_name.as_str() {
            "INSERT" => Ok(ChangeOperation::Insert),
            "MODIFY" => Ok(ChangeOperation::Modify),
            "REMOVE" => Ok(ChangeOperation::Remove),
            other => Err(CodecError::UnsupportedEventName {
                event_name: other.to_string(),
            }),
        }
    }

    /// Identifier used in logs: the event id, else the sequence number.
    pub fn trace_id(&self) -> &str {
        self.event_id
            .as_deref()
            .or(self.images.sequence_number.as_deref())
            .unwrap_or("-")
    }
}

/// A batch of change records, parsed leniently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StreamBatch {
    /// Raw change records; each is decoded on its own.
    #[serde(rename = "Records", default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub records: Vec<serde_json::Value>,
}

impl StreamBatch {
    pub fn from_records(records: impl IntoIterator<Item = StreamRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
