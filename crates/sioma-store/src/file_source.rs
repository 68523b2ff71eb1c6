//! JSON-export backend used for offline dashboards and fixtures.
//!
//! Accepts three payload shapes: a Firestore `runQuery` response array, a
//! `{"documents": [...]}` list response, or an array of
//! `{"id": "...", "fields": {...}}` export records whose field values are
//! either Firestore typed values or plain JSON.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sioma_types::{RawEvent, RawValue};

use crate::firestore::{decode_document, decode_firestore_value, is_firestore_typed_value};
use crate::{sort_newest_first, EventSource, SourceError, SourceResult};

#[derive(Debug, Clone)]
pub struct FileEventSource {
    path: PathBuf,
}

impl FileEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventSource for FileEventSource {
    fn describe(&self) -> String {
        format!("file path={}", self.path.display())
    }

    async fn fetch(&self) -> SourceResult<Vec<RawEvent>> {
        let payload = tokio::fs::read_to_string(&self.path).await?;
        let mut events = parse_event_export(&payload)?;
        sort_newest_first(&mut events);
        Ok(events)
    }
}

/// Parses an event export payload in any supported shape.
pub fn parse_event_export(payload: &str) -> SourceResult<Vec<RawEvent>> {
    let value = serde_json::from_str::<Value>(payload)?;
    let entries = match &value {
        Value::Array(entries) => entries.as_slice(),
        Value::Object(object) => object
            .get("documents")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                SourceError::InvalidDocument(
                    "export object must contain a 'documents' array".to_string(),
                )
            })?,
        _ => {
            return Err(SourceError::InvalidDocument(
                "export payload must be a JSON array or object".to_string(),
            ))
        }
    };

    let mut events = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if let Some(document) = entry.get("document") {
            events.push(decode_document(document)?);
        } else if entry.get("name").is_some() {
            events.push(decode_document(entry)?);
        } else if entry.get("readTime").is_some() && entry.get("fields").is_none() {
            continue;
        } else {
            events.push(decode_export_record(entry, index)?);
        }
    }
    Ok(events)
}

fn decode_export_record(entry: &Value, index: usize) -> SourceResult<RawEvent> {
    let object = entry.as_object().ok_or_else(|| {
        SourceError::InvalidDocument(format!("export entry {index} is not an object"))
    })?;
    let source_id = object
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            SourceError::InvalidDocument(format!("export entry {index} is missing 'id'"))
        })?;
    let empty = Map::new();
    let raw_fields = object
        .get("fields")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut fields = BTreeMap::new();
    for (name, value) in raw_fields {
        let decoded = if is_firestore_typed_value(value) {
            decode_firestore_value(value)
        } else {
            plain_json_value(value)
        };
        fields.insert(name.clone(), decoded);
    }
    Ok(RawEvent {
        source_id: source_id.to_string(),
        fields,
    })
}

fn plain_json_value(value: &Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::Bool(flag) => RawValue::Boolean(*flag),
        Value::Number(number) => number
            .as_i64()
            .map(RawValue::Integer)
            .or_else(|| number.as_f64().map(RawValue::Double))
            .unwrap_or_else(|| RawValue::Other(value.clone())),
        Value::String(text) => RawValue::String(text.clone()),
        Value::Array(_) | Value::Object(_) => RawValue::Other(value.clone()),
    }
}
