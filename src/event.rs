//! The event record every generator produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Envelope keys. Extracted fields must not reuse them.
pub const ENVELOPE_KEYS: &[&str] = &["_time", "_raw", "host", "source", "sourcetype", "index"];

/// One synthesized event.
///
/// The envelope mirrors what Splunk stores for an indexed event: `_time`,
/// `_raw`, `host`, `source`, `sourcetype` and `index`. Generator-specific
/// extracted fields are flattened next to the envelope when serialized,
/// which is the shape the visualization and the HEC shipper consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the event was generated
    #[serde(rename = "_time", with = "crate::format::iso8601")]
    pub time: DateTime<Utc>,

    /// The event as it would appear in a log or metric stream
    #[serde(rename = "_raw")]
    pub raw: String,

    /// Host or sensor that emitted the event
    pub host: String,

    /// Origin path or system
    pub source: String,

    /// Format tag
    pub sourcetype: String,

    /// Logical destination
    pub index: String,

    /// Extracted fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Event {
    /// Create an event with an empty field set.
    pub fn new(
        time: DateTime<Utc>,
        raw: impl Into<String>,
        host: impl Into<String>,
        source: impl Into<String>,
        sourcetype: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            time,
            raw: raw.into(),
            host: host.into(),
            source: source.into(),
            sourcetype: sourcetype.into(),
            index: index.into(),
            fields: Map::new(),
        }
    }

    /// Add an extracted field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_field(key, value);
        self
    }

    /// Add every entry of `fields` as an extracted field, keeping their order.
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        for (key, value) in fields {
            self.insert_field(key, value);
        }
        self
    }

    /// Insert or replace an extracted field. Envelope keys are ignored.
    pub fn insert_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if ENVELOPE_KEYS.contains(&key.as_str()) {
            return;
        }
        self.fields.insert(key, value.into());
    }

    /// Look up an extracted field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up an extracted string field.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Size of the rendered raw text in bytes.
    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }
}

/// A group of events flushed together from the buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBatch {
    /// Client-generated batch ID, also used as the HEC request channel
    pub batch_id: Uuid,

    /// Events in generation order
    pub events: Vec<Event>,
}

impl EventBatch {
    /// Create a batch with a fresh batch ID.
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            events,
        }
    }

    /// Get the number of events in the batch.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
