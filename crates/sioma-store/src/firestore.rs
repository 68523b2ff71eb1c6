//! Firestore REST backend for the event collection.
//!
//! Issues one `documents:runQuery` call with a structured query ordered by the
//! timestamp field descending and decodes Firestore typed values into
//! [`RawValue`]. Token minting is out of scope: the handle carries an optional
//! bearer token supplied by the operator, and emulator endpoints need none.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sioma_types::{RawEvent, RawValue};

use crate::credentials::ServiceAccountCredential;
use crate::{EventSource, SourceError, SourceResult};

pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";
pub const DEFAULT_COLLECTION: &str = "work_logs";
pub const DEFAULT_ORDER_FIELD: &str = "timestamp";
const DEFAULT_DATABASE: &str = "(default)";
const ERROR_BODY_PREVIEW_CHARS: usize = 240;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreSourceConfig {
    pub base_url: String,
    pub project_id: String,
    pub database: String,
    pub collection: String,
    pub order_field: String,
    pub access_token: Option<String>,
}

impl FirestoreSourceConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_FIRESTORE_BASE_URL.to_string(),
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            order_field: DEFAULT_ORDER_FIELD.to_string(),
            access_token: None,
        }
    }

    /// Builds a config for the project named by a resolved credential.
    pub fn from_credential(credential: &ServiceAccountCredential) -> Self {
        Self::new(credential.project_id.clone())
    }

    pub fn run_query_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents:runQuery",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.database
        )
    }

    fn structured_query(&self) -> Value {
        json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.collection }],
                "orderBy": [{
                    "field": { "fieldPath": self.order_field },
                    "direction": "DESCENDING"
                }]
            }
        })
    }
}

/// Authenticated handle to one Firestore collection.
#[derive(Debug, Clone)]
pub struct FirestoreEventSource {
    config: FirestoreSourceConfig,
    client: reqwest::Client,
}

impl FirestoreEventSource {
    pub fn new(config: FirestoreSourceConfig) -> SourceResult<Self> {
        if config.project_id.trim().is_empty() {
            return Err(SourceError::Unavailable(
                "firestore project id cannot be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder().build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl EventSource for FirestoreEventSource {
    fn describe(&self) -> String {
        format!(
            "firestore project={} collection={}",
            self.config.project_id, self.config.collection
        )
    }

    async fn fetch(&self) -> SourceResult<Vec<RawEvent>> {
        let url = self.config.run_query_url();
        let mut request = self
            .client
            .post(&url)
            .json(&self.config.structured_query());
        if let Some(token) = self
            .config
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
        {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
            });
        }
        let payload = response.json::<Value>().await?;
        let events = decode_run_query_response(&payload)?;
        tracing::debug!(
            project = %self.config.project_id,
            collection = %self.config.collection,
            documents = events.len(),
            "firestore run query completed"
        );
        Ok(events)
    }
}

/// Decodes a `runQuery` response array; entries without a `document` (the
/// trailing read-time marker) are skipped.
pub(crate) fn decode_run_query_response(payload: &Value) -> SourceResult<Vec<RawEvent>> {
    let entries = payload.as_array().ok_or_else(|| {
        SourceError::InvalidDocument("runQuery response must be a JSON array".to_string())
    })?;
    entries
        .iter()
        .filter_map(|entry| entry.get("document"))
        .map(decode_document)
        .collect()
}

/// Decodes one Firestore REST document (`name` + typed `fields`).
pub fn decode_document(document: &Value) -> SourceResult<RawEvent> {
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::InvalidDocument("document is missing 'name'".to_string()))?;
    let source_id = name
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| SourceError::InvalidDocument(format!("document name '{name}' has no id")))?;

    let mut fields = BTreeMap::new();
    if let Some(raw_fields) = document.get("fields").and_then(Value::as_object) {
        for (field_name, value) in raw_fields {
            fields.insert(field_name.clone(), decode_firestore_value(value));
        }
    }
    Ok(RawEvent {
        source_id: source_id.to_string(),
        fields,
    })
}

/// Maps a Firestore typed value (`{"stringValue": "..."}` and friends) onto
/// [`RawValue`]. Malformed scalars and structured kinds fall back to `Other`.
pub fn decode_firestore_value(value: &Value) -> RawValue {
    let Some(object) = value.as_object().filter(|object| object.len() == 1) else {
        return RawValue::Other(value.clone());
    };
    let Some((kind, inner)) = object.iter().next() else {
        return RawValue::Other(value.clone());
    };
    match kind.as_str() {
        "nullValue" => RawValue::Null,
        "booleanValue" => inner
            .as_bool()
            .map(RawValue::Boolean)
            .unwrap_or_else(|| RawValue::Other(value.clone())),
        "integerValue" => inner
            .as_str()
            .and_then(|raw| raw.parse::<i64>().ok())
            .or_else(|| inner.as_i64())
            .map(RawValue::Integer)
            .unwrap_or_else(|| RawValue::Other(value.clone())),
        "doubleValue" => inner
            .as_f64()
            .map(RawValue::Double)
            .unwrap_or_else(|| RawValue::Other(value.clone())),
        "stringValue" => inner
            .as_str()
            .map(|raw| RawValue::String(raw.to_string()))
            .unwrap_or_else(|| RawValue::Other(value.clone())),
        "timestampValue" => inner
            .as_str()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|instant| RawValue::Timestamp(instant.with_timezone(&Utc)))
            .unwrap_or_else(|| RawValue::Other(value.clone())),
        _ => RawValue::Other(value.clone()),
    }
}

/// True when `value` looks like a Firestore typed value rather than plain JSON.
pub(crate) fn is_firestore_typed_value(value: &Value) -> bool {
    value
        .as_object()
        .filter(|object| object.len() == 1)
        .and_then(|object| object.keys().next())
        .map(|key| key.ends_with("Value"))
        .unwrap_or(false)
}
