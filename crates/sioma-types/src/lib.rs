//! Shared data types for the SIOMA work-log pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod notice;

pub use notice::{
    DashboardNotice, NoticeSeverity, PipelineError, REASON_EMPTY_RESULT, REASON_EMPTY_SOURCE,
    REASON_INVALID_FILTER, REASON_SCHEMA_INCOMPLETE, REASON_SOURCE_UNAVAILABLE,
};

/// Event type recorded when a worker checks in.
pub const EVENT_TYPE_ENTRANCE: &str = "entrada";
/// Event type recorded when a worker checks out.
pub const EVENT_TYPE_EXIT: &str = "salida";

/// Field names as the mobile client writes them into the store.
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_WORKER_NAME: &str = "workerName";
pub const FIELD_EVENT_TYPE: &str = "eventType";
pub const FIELD_SYNCED: &str = "synced";
pub const FIELD_ID: &str = "id";
pub const FIELD_SOURCE_ID: &str = "sourceId";

/// Store-native value kinds carried by a raw document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    /// Store-native temporal value, always UTC on the wire.
    Timestamp(DateTime<Utc>),
    /// Maps, arrays, references and anything else kept verbatim.
    Other(Value),
}

impl RawValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Renders scalar values as display text; `None` for null and structured values.
    pub fn display_text(&self) -> Option<String> {
        match self {
            Self::Null | Self::Other(_) => None,
            Self::Boolean(value) => Some(value.to_string()),
            Self::Integer(value) => Some(value.to_string()),
            Self::Double(value) => Some(value.to_string()),
            Self::String(value) => Some(value.clone()),
            Self::Timestamp(value) => Some(value.to_rfc3339()),
        }
    }
}

/// One loosely-typed document as returned by an event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Store-assigned document key.
    pub source_id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, RawValue>,
}

impl RawEvent {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: RawValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }

    /// The record's instant if its `timestamp` is convertible: a store-native
    /// timestamp or an RFC 3339 string.
    pub fn timestamp_instant(&self) -> Option<DateTime<Utc>> {
        match self.fields.get(FIELD_TIMESTAMP)? {
            RawValue::Timestamp(value) => Some(*value),
            RawValue::String(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .ok()
                .map(|parsed| parsed.with_timezone(&Utc)),
            _ => None,
        }
    }
}

/// Canonical check-in/check-out record produced by normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkEvent {
    /// Event instant shifted into the display timezone.
    pub timestamp: DateTime<FixedOffset>,
    pub worker_name: Option<String>,
    pub event_type: Option<String>,
    pub synced: Option<bool>,
    /// Client-assigned identifier, display only.
    pub id: Option<String>,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, RawValue>,
}

impl WorkEvent {
    /// Calendar day of the event in the display timezone.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn is_entrance(&self) -> bool {
        self.event_type.as_deref() == Some(EVENT_TYPE_ENTRANCE)
    }

    pub fn is_exit(&self) -> bool {
        self.event_type.as_deref() == Some(EVENT_TYPE_EXIT)
    }
}

/// Columns a fetched batch can expose, in display preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventColumn {
    #[serde(rename = "timestamp")]
    Timestamp,
    #[serde(rename = "workerName")]
    WorkerName,
    #[serde(rename = "eventType")]
    EventType,
    #[serde(rename = "synced")]
    Synced,
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "sourceId")]
    SourceId,
}

impl EventColumn {
    pub const PREFERRED_ORDER: [EventColumn; 6] = [
        Self::Timestamp,
        Self::WorkerName,
        Self::EventType,
        Self::Synced,
        Self::Id,
        Self::SourceId,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timestamp => FIELD_TIMESTAMP,
            Self::WorkerName => FIELD_WORKER_NAME,
            Self::EventType => FIELD_EVENT_TYPE,
            Self::Synced => FIELD_SYNCED,
            Self::Id => FIELD_ID,
            Self::SourceId => FIELD_SOURCE_ID,
        }
    }
}

/// Normalized batch: the per-fetch column schema plus its records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTable {
    pub columns: Vec<EventColumn>,
    pub events: Vec<WorkEvent>,
}

impl EventTable {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_event(event_type: Option<&str>) -> WorkEvent {
        WorkEvent {
            timestamp: Utc
                .with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
                .single()
                .expect("instant")
                .fixed_offset(),
            worker_name: Some("Ana".to_string()),
            event_type: event_type.map(str::to_string),
            synced: Some(true),
            id: Some("17".to_string()),
            source_id: "doc-1".to_string(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn unit_work_event_classifies_entrance_and_exit() {
        assert!(sample_event(Some("entrada")).is_entrance());
        assert!(sample_event(Some("salida")).is_exit());
        let other = sample_event(Some("pausa"));
        assert!(!other.is_entrance());
        assert!(!other.is_exit());
        assert!(!sample_event(None).is_entrance());
    }

    #[test]
    fn unit_work_event_serializes_with_store_field_names() {
        let value = serde_json::to_value(sample_event(Some("entrada"))).expect("serialize");
        assert_eq!(value["workerName"], "Ana");
        assert_eq!(value["eventType"], "entrada");
        assert_eq!(value["sourceId"], "doc-1");
        assert!(value.get("extra").is_none());
    }

    #[test]
    fn unit_event_column_order_matches_store_names() {
        let names = EventColumn::PREFERRED_ORDER
            .iter()
            .map(|column| column.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["timestamp", "workerName", "eventType", "synced", "id", "sourceId"]
        );
    }

    #[test]
    fn unit_raw_value_display_text_skips_structured_values() {
        assert_eq!(RawValue::Integer(4).display_text().as_deref(), Some("4"));
        assert_eq!(
            RawValue::String("x".to_string()).display_text().as_deref(),
            Some("x")
        );
        assert_eq!(RawValue::Null.display_text(), None);
        assert_eq!(
            RawValue::Other(serde_json::json!({"a": 1})).display_text(),
            None
        );
    }
}
