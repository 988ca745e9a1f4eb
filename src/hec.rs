//! Splunk HTTP Event Collector wire format.
//!
//! A batch is posted as newline-delimited JSON objects, one per event:
//!
//! ```text
//! {"time":1714564800.123,"host":"edge-01","source":"...","sourcetype":"syslog","index":"os","event":"<raw>","fields":{...}}
//! ```
//!
//! The collector answers `{"text":"Success","code":0}`. Any other code is a
//! rejection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::event::{Event, EventBatch};
use crate::format::epoch_seconds;

/// Path of the JSON event endpoint, relative to the collector base URL.
pub const HEC_EVENT_PATH: &str = "/services/collector/event";

/// Header carrying the request channel.
pub const HEC_CHANNEL_HEADER: &str = "X-Splunk-Request-Channel";

/// Code the collector returns for an accepted request.
pub const HEC_SUCCESS_CODE: i64 = 0;

/// One event as the collector expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HecEvent {
    /// Epoch seconds with millisecond precision
    pub time: f64,
    pub host: String,
    pub source: String,
    pub sourcetype: String,
    pub index: String,

    /// The raw event text
    pub event: String,

    /// Indexed fields. Only scalar values are carried
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl From<&Event> for HecEvent {
    fn from(event: &Event) -> Self {
        let fields = event
            .fields
            .iter()
            .filter(|(_, value)| is_scalar(value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            time: epoch_seconds(&event.time),
            host: event.host.clone(),
            source: event.source.clone(),
            sourcetype: event.sourcetype.clone(),
            index: event.index.clone(),
            event: event.raw.clone(),
            fields,
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// A batch ready to post.
#[derive(Debug, Clone)]
pub struct HecBatch {
    /// Sent as the request channel
    pub batch_id: Uuid,
    pub events: Vec<HecEvent>,
}

impl HecBatch {
    /// Convert a buffered batch, keeping its batch ID.
    pub fn from_batch(batch: &EventBatch) -> Self {
        Self {
            batch_id: batch.batch_id,
            events: batch.events.iter().map(HecEvent::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Render the request body: one JSON object per line.
    pub fn to_ndjson(&self) -> Result<String, serde_json::Error> {
        let mut body = String::new();
        for event in &self.events {
            body.push_str(&serde_json::to_string(event)?);
            body.push('\n');
        }
        Ok(body)
    }
}

/// Acknowledgement returned by the collector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HecResponse {
    pub text: String,
    pub code: i64,

    /// Index of the first rejected event, when the collector reports one
    #[serde(default, rename = "invalid-event-number")]
    pub invalid_event_number: Option<u64>,
}

impl HecResponse {
    pub fn is_success(&self) -> bool {
        self.code == HEC_SUCCESS_CODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_event() -> Event {
        Event::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            r#"{"sensor_id":"edge-01-sensor","readings":{"temperature_c":24.1}}"#,
            "edge-01-sensor",
            "iot-gateway",
            "iot:sensor",
            "metrics",
        )
        .with_field("sensor_id", "edge-01-sensor")
        .with_field("readings", serde_json::json!({"temperature_c": 24.1}))
        .with_field("battery_pct", 81)
        .with_field("node_id", "edge-01")
    }

    #[test]
    fn test_hec_event_from_event() {
        let event = sample_event();
        let hec = HecEvent::from(&event);

        assert_eq!(hec.time, 1_714_564_800.0);
        assert_eq!(hec.host, "edge-01-sensor");
        assert_eq!(hec.source, "iot-gateway");
        assert_eq!(hec.sourcetype, "iot:sensor");
        assert_eq!(hec.index, "metrics");
        assert_eq!(hec.event, event.raw);
    }

    #[test]
    fn test_hec_fields_are_scalar_only() {
        let hec = HecEvent::from(&sample_event());

        assert_eq!(hec.fields.len(), 3);
        assert_eq!(hec.fields["sensor_id"], "edge-01-sensor");
        assert_eq!(hec.fields["battery_pct"], 81);
        assert_eq!(hec.fields["node_id"], "edge-01");
        assert!(!hec.fields.contains_key("readings"));
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let mut event = sample_event();
        event.fields.clear();
        let json = serde_json::to_string(&HecEvent::from(&event)).unwrap();
        assert!(!json.contains("\"fields\""));
    }

    #[test]
    fn test_batch_keeps_id_and_order() {
        let mut second = sample_event();
        second.host = "edge-02".to_string();
        let batch = EventBatch::new(vec![sample_event(), second]);

        let hec = HecBatch::from_batch(&batch);
        assert_eq!(hec.batch_id, batch.batch_id);
        assert_eq!(hec.len(), 2);
        assert_eq!(hec.events[1].host, "edge-02");
    }

    #[test]
    fn test_ndjson_body() {
        let batch = EventBatch::new(vec![sample_event(), sample_event(), sample_event()]);
        let body = HecBatch::from_batch(&batch).to_ndjson().unwrap();

        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(body.ends_with('\n'));

        for line in lines {
            let parsed: Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed["sourcetype"], "iot:sensor");
            assert_eq!(parsed["time"], 1_714_564_800.0);
            assert!(parsed["event"].as_str().unwrap().starts_with('{'));
        }
    }

    #[test]
    fn test_empty_batch_body() {
        let batch = HecBatch::from_batch(&EventBatch::new(Vec::new()));
        assert!(batch.is_empty());
        assert_eq!(batch.to_ndjson().unwrap(), "");
    }

    #[test]
    fn test_response_deserialization() {
        let ok: HecResponse = serde_json::from_str(r#"{"text":"Success","code":0}"#).unwrap();
        assert!(ok.is_success());
        assert!(ok.invalid_event_number.is_none());

        let rejected: HecResponse = serde_json::from_str(
            r#"{"text":"Invalid data format","code":6,"invalid-event-number":2}"#,
        )
        .unwrap();
        assert!(!rejected.is_success());
        assert_eq!(rejected.code, 6);
        assert_eq!(rejected.invalid_event_number, Some(2));
    }
}
