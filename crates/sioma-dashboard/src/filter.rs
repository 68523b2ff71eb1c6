//! Worker, event-type and date-range filtering.
//!
//! A [`FilterSelection`] is what the operator asked for; it is resolved
//! against the facets of the unfiltered dataset into a [`ResolvedFilter`]
//! (defaults filled in, date range validated) before any record is tested.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sioma_types::{PipelineError, WorkEvent};

/// Values available for building filter controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFacets {
    pub workers: Vec<String>,
    pub event_types: Vec<String>,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

impl FilterFacets {
    pub fn from_events(events: &[WorkEvent]) -> Self {
        let mut workers = BTreeSet::new();
        let mut event_types = BTreeSet::new();
        let mut min_date: Option<NaiveDate> = None;
        let mut max_date: Option<NaiveDate> = None;
        for event in events {
            if let Some(worker) = event.worker_name.as_deref() {
                workers.insert(worker.to_string());
            }
            if let Some(event_type) = event.event_type.as_deref() {
                event_types.insert(event_type.to_string());
            }
            let date = event.date();
            min_date = Some(min_date.map_or(date, |current| current.min(date)));
            max_date = Some(max_date.map_or(date, |current| current.max(date)));
        }
        Self {
            workers: workers.into_iter().collect(),
            event_types: event_types.into_iter().collect(),
            min_date,
            max_date,
        }
    }
}

/// Date-range control state. `Dates` must hold exactly a start and an end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRangeSelection {
    /// Untouched control: the full observed span.
    #[default]
    FullSpan,
    Dates(Vec<NaiveDate>),
}

impl DateRangeSelection {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self::Dates(vec![start, end])
    }
}

/// Operator selection. `None` means "everything observed".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub workers: Option<BTreeSet<String>>,
    pub event_types: Option<BTreeSet<String>>,
    #[serde(default)]
    pub date_range: DateRangeSelection,
}

impl FilterSelection {
    /// Fills defaults from `facets` and validates the date range. An incomplete
    /// or reversed range fails closed.
    pub fn resolve(&self, facets: &FilterFacets) -> Result<ResolvedFilter, PipelineError> {
        let (start, end) = match &self.date_range {
            DateRangeSelection::FullSpan => (
                facets.min_date.unwrap_or(NaiveDate::MIN),
                facets.max_date.unwrap_or(NaiveDate::MAX),
            ),
            DateRangeSelection::Dates(dates) => match dates.as_slice() {
                [start, end] if start <= end => (*start, *end),
                [start, end] => {
                    return Err(PipelineError::InvalidFilterSelection(format!(
                        "date range start {start} is after end {end}"
                    )))
                }
                other => {
                    return Err(PipelineError::InvalidFilterSelection(format!(
                        "select a date range with a start and an end date (got {} date{})",
                        other.len(),
                        if other.len() == 1 { "" } else { "s" }
                    )))
                }
            },
        };

        let workers = self
            .workers
            .clone()
            .unwrap_or_else(|| facets.workers.iter().cloned().collect());
        let event_types = self
            .event_types
            .clone()
            .unwrap_or_else(|| facets.event_types.iter().cloned().collect());
        Ok(ResolvedFilter {
            workers,
            event_types,
            start,
            end,
        })
    }
}

/// Fully specified predicate: every set explicit, both bounds inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFilter {
    pub workers: BTreeSet<String>,
    pub event_types: BTreeSet<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ResolvedFilter {
    pub fn matches(&self, event: &WorkEvent) -> bool {
        let worker_ok = event
            .worker_name
            .as_deref()
            .is_some_and(|worker| self.workers.contains(worker));
        let event_type_ok = event
            .event_type
            .as_deref()
            .is_some_and(|event_type| self.event_types.contains(event_type));
        let date = event.date();
        worker_ok && event_type_ok && self.start <= date && date <= self.end
    }
}

pub fn filter_events(events: &[WorkEvent], filter: &ResolvedFilter) -> Vec<WorkEvent> {
    events
        .iter()
        .filter(|event| filter.matches(event))
        .cloned()
        .collect()
}
