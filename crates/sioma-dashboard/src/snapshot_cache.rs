//! Time-bounded cache of normalized event snapshots.
//!
//! A snapshot is the whole result of one fetch-and-normalize cycle and is
//! published with a single pointer swap, so readers never see a mix of two
//! generations. Within the TTL every caller receives the same `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use serde::Serialize;
use sioma_core::{current_unix_timestamp_ms, elapsed_at_least, DisplayTimezone};
use sioma_store::EventSource;
use sioma_types::{DashboardNotice, EventTable, PipelineError};
use tokio::sync::Mutex;

use crate::normalize::normalize_events;

/// Snapshots older than this are refetched on next access.
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(60);

/// One immutable generation of the normalized dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSnapshot {
    pub generation: u64,
    pub fetched_at_unix_ms: u64,
    pub source: String,
    pub fetched: usize,
    pub dropped: usize,
    pub table: EventTable,
    /// Set when fetch or normalization degraded this snapshot to empty.
    pub notice: Option<DashboardNotice>,
}

impl EventSnapshot {
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[derive(Debug)]
struct CachedSnapshot {
    snapshot: Arc<EventSnapshot>,
    loaded_at: Instant,
}

#[derive(Debug)]
pub struct SnapshotCache {
    timezone: DisplayTimezone,
    slot: ArcSwapOption<CachedSnapshot>,
    refresh_guard: Mutex<()>,
    next_generation: AtomicU64,
}

impl SnapshotCache {
    pub fn new(timezone: DisplayTimezone) -> Self {
        Self {
            timezone,
            slot: ArcSwapOption::empty(),
            refresh_guard: Mutex::new(()),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn timezone(&self) -> DisplayTimezone {
        self.timezone
    }

    pub async fn get_or_fetch(&self, source: &dyn EventSource) -> Arc<EventSnapshot> {
        self.get_or_fetch_at(source, Instant::now()).await
    }

    /// Returns the cached snapshot if it is younger than the TTL at `now`,
    /// otherwise runs one fetch-and-normalize cycle and publishes the result.
    pub async fn get_or_fetch_at(
        &self,
        source: &dyn EventSource,
        now: Instant,
    ) -> Arc<EventSnapshot> {
        if let Some(snapshot) = self.fresh_snapshot(now) {
            tracing::trace!(generation = snapshot.generation, "snapshot cache hit");
            return snapshot;
        }

        let _guard = self.refresh_guard.lock().await;
        if let Some(snapshot) = self.fresh_snapshot(now) {
            return snapshot;
        }

        let snapshot = Arc::new(self.load_snapshot(source).await);
        self.slot.store(Some(Arc::new(CachedSnapshot {
            snapshot: Arc::clone(&snapshot),
            loaded_at: now,
        })));
        snapshot
    }

    /// Drops the cached snapshot; the next access fetches immediately.
    pub fn invalidate(&self) {
        if self.slot.swap(None).is_some() {
            tracing::debug!("snapshot cache invalidated");
        }
    }

    fn fresh_snapshot(&self, now: Instant) -> Option<Arc<EventSnapshot>> {
        let cached = self.slot.load_full()?;
        if elapsed_at_least(cached.loaded_at, now, SNAPSHOT_TTL) {
            return None;
        }
        Some(Arc::clone(&cached.snapshot))
    }

    async fn load_snapshot(&self, source: &dyn EventSource) -> EventSnapshot {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let description = source.describe();
        let mut snapshot = EventSnapshot {
            generation,
            fetched_at_unix_ms: current_unix_timestamp_ms(),
            source: description.clone(),
            fetched: 0,
            dropped: 0,
            table: EventTable::default(),
            notice: None,
        };

        let raw_events = match source.fetch().await {
            Ok(raw_events) => raw_events,
            Err(error) => {
                tracing::warn!(source = %description, error = %error, "event fetch failed");
                let failure = PipelineError::SourceUnavailable(error.to_string());
                snapshot.notice = Some(failure.to_notice());
                return snapshot;
            }
        };

        snapshot.fetched = raw_events.len();
        match normalize_events(raw_events, self.timezone) {
            Ok(batch) => {
                snapshot.dropped = batch.dropped;
                snapshot.table = batch.table;
            }
            Err(error) => {
                tracing::warn!(
                    source = %description,
                    reason_code = error.reason_code(),
                    "normalization produced no usable records"
                );
                snapshot.dropped = snapshot.fetched;
                snapshot.notice = Some(error.to_notice());
            }
        }
        tracing::debug!(
            generation,
            fetched = snapshot.fetched,
            normalized = snapshot.table.len(),
            "snapshot loaded"
        );
        snapshot
    }
}
