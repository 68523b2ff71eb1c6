//! Normalization, caching, filtering and aggregation for the SIOMA dashboard.
//!
//! The pipeline runs once per interaction: a cached snapshot of normalized
//! events is filtered by the operator's selection and summarized into KPI
//! counts and time-bucketed series for a presentation sink.

pub mod aggregate;
pub mod filter;
pub mod normalize;
pub mod render;
pub mod session;
pub mod snapshot_cache;

pub use aggregate::{
    aggregate, daily_activity, global_max_daily, DailyBucket, Summary, WorkerActivity,
    AXIS_MARGIN,
};
pub use filter::{
    filter_events, DateRangeSelection, FilterFacets, FilterSelection, ResolvedFilter,
};
pub use normalize::{normalize_events, NormalizedBatch};
pub use render::{
    display_rows, render_dashboard_text, render_events_text, render_facets_text, EventRow,
};
pub use session::{DashboardSession, DashboardView};
pub use snapshot_cache::{EventSnapshot, SnapshotCache, SNAPSHOT_TTL};
