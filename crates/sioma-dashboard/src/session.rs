//! Constructed-once dashboard state and its two control triggers.

use std::sync::Arc;

use serde::Serialize;
use sioma_core::DisplayTimezone;
use sioma_store::EventSource;
use sioma_types::{DashboardNotice, EventColumn, PipelineError};

use crate::aggregate::{aggregate, Summary};
use crate::filter::{filter_events, FilterFacets, FilterSelection, ResolvedFilter};
use crate::render::{display_rows, EventRow};
use crate::snapshot_cache::SnapshotCache;

/// Everything a presentation sink needs for one interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub generation: u64,
    pub source: String,
    pub fetched_at_unix_ms: u64,
    pub timezone: String,
    /// Normalized records in the unfiltered snapshot.
    pub record_count: usize,
    pub columns: Vec<EventColumn>,
    pub facets: FilterFacets,
    /// `None` when the snapshot holds no records.
    pub filter: Option<ResolvedFilter>,
    /// `None` when the snapshot holds no records.
    pub summary: Option<Summary>,
    pub rows: Vec<EventRow>,
    pub notices: Vec<DashboardNotice>,
}

pub struct DashboardSession {
    source: Arc<dyn EventSource>,
    cache: SnapshotCache,
    last_view: Option<Arc<DashboardView>>,
}

impl DashboardSession {
    pub fn new(source: Arc<dyn EventSource>, timezone: DisplayTimezone) -> Self {
        Self {
            source,
            cache: SnapshotCache::new(timezone),
            last_view: None,
        }
    }

    /// Last successfully computed view; untouched by rejected selections.
    pub fn last_view(&self) -> Option<Arc<DashboardView>> {
        self.last_view.clone()
    }

    /// Drops the cached snapshot so the next interaction refetches.
    pub fn reload(&self) {
        tracing::info!(source = %self.source.describe(), "dashboard reload requested");
        self.cache.invalidate();
    }

    /// Runs one filter-and-aggregate pass over the current snapshot.
    ///
    /// An invalid selection fails closed: nothing is aggregated and the
    /// previous view is kept.
    pub async fn apply_filter(
        &mut self,
        selection: &FilterSelection,
    ) -> Result<Arc<DashboardView>, PipelineError> {
        let snapshot = self.cache.get_or_fetch(self.source.as_ref()).await;
        let events = &snapshot.table.events;
        let facets = FilterFacets::from_events(events);
        let mut view = DashboardView {
            generation: snapshot.generation,
            source: snapshot.source.clone(),
            fetched_at_unix_ms: snapshot.fetched_at_unix_ms,
            timezone: self.cache.timezone().label(),
            record_count: events.len(),
            columns: snapshot.table.columns.clone(),
            facets,
            filter: None,
            summary: None,
            rows: Vec::new(),
            notices: snapshot.notice.iter().cloned().collect(),
        };

        if !snapshot.is_empty() {
            let filter = match selection.resolve(&view.facets) {
                Ok(filter) => filter,
                Err(error) => {
                    tracing::warn!(
                        reason_code = error.reason_code(),
                        error = %error,
                        "filter selection rejected"
                    );
                    return Err(error);
                }
            };
            let filtered = filter_events(events, &filter);
            if filtered.is_empty() {
                view.notices.push(DashboardNotice::empty_result());
            }
            tracing::debug!(
                generation = snapshot.generation,
                matched = filtered.len(),
                total = events.len(),
                "filter applied"
            );
            view.summary = Some(aggregate(&filtered, events));
            view.rows = display_rows(&filtered, &view.columns);
            view.filter = Some(filter);
        }

        let view = Arc::new(view);
        self.last_view = Some(Arc::clone(&view));
        Ok(view)
    }
}
