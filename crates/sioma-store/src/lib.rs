//! Event-source boundary for the SIOMA work-log pipeline.
//!
//! Defines the async [`EventSource`] contract ("fetch every document in the
//! collection, newest first") and its Firestore REST, JSON-file and in-memory
//! backends, plus the credential provider that yields a store handle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use sioma_types::RawEvent;
use thiserror::Error;

pub mod credentials;
mod file_source;
mod firestore;

pub use credentials::{
    resolve_credential_provider, CredentialError, CredentialKind, CredentialLookupOptions,
    CredentialProvider, JsonStringSecretCredential, LocalFileCredential,
    ServiceAccountCredential, StructuredSecretCredential, DEFAULT_LOCAL_KEY_PATH,
    DEFAULT_SECRETS_KEY, DEFAULT_SECRETS_PATH, JSON_SECRET_ENV,
};
pub use file_source::{parse_event_export, FileEventSource};
pub use firestore::{
    decode_document, decode_firestore_value, FirestoreEventSource, FirestoreSourceConfig,
    DEFAULT_COLLECTION, DEFAULT_FIRESTORE_BASE_URL, DEFAULT_ORDER_FIELD,
};

/// Result type for event-source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors returned by event-source implementations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("event source request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("event source returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid document in event source payload: {0}")]
    InvalidDocument(String),
    #[error("event source unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read-only contract for the remote event collection.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Short label used in logs and diagnostics.
    fn describe(&self) -> String;

    /// Fetches every document in the collection ordered by timestamp descending.
    async fn fetch(&self) -> SourceResult<Vec<RawEvent>>;
}

/// Orders raw documents newest first; documents without a convertible
/// timestamp go last, keeping their relative order.
pub fn sort_newest_first(events: &mut [RawEvent]) {
    events.sort_by(|left, right| right.timestamp_instant().cmp(&left.timestamp_instant()));
}

/// In-memory implementation for tests and local experimentation.
#[derive(Debug, Default)]
pub struct InMemoryEventSource {
    events: Mutex<Vec<RawEvent>>,
    failure: Mutex<Option<String>>,
    fetch_count: AtomicUsize,
}

impl InMemoryEventSource {
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Self::default()
        }
    }

    pub fn set_events(&self, events: Vec<RawEvent>) {
        if let Ok(mut guard) = self.events.lock() {
            *guard = events;
        }
    }

    /// Makes every later fetch fail with `reason` until cleared with `None`.
    pub fn set_failure(&self, reason: Option<String>) {
        if let Ok(mut guard) = self.failure.lock() {
            *guard = reason;
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for InMemoryEventSource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn fetch(&self) -> SourceResult<Vec<RawEvent>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failure
            .lock()
            .map_err(|_| SourceError::Unavailable("in-memory source lock poisoned".to_string()))?
            .clone();
        if let Some(reason) = failure {
            return Err(SourceError::Unavailable(reason));
        }
        let mut events = self
            .events
            .lock()
            .map_err(|_| SourceError::Unavailable("in-memory source lock poisoned".to_string()))?
            .clone();
        sort_newest_first(&mut events);
        Ok(events)
    }
}
