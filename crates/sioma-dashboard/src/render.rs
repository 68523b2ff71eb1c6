//! Plain-text presentation of dashboard views.

use serde::{Deserialize, Serialize};
use sioma_types::{EventColumn, WorkEvent};

use crate::filter::FilterFacets;
use crate::session::DashboardView;

const ROW_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const BAR_WIDTH: u64 = 40;

/// One line of the detail table. Columns absent from the batch stay `None`
/// and are skipped when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRow {
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Detail rows, newest first, restricted to the columns the batch carries.
pub fn display_rows(events: &[WorkEvent], columns: &[EventColumn]) -> Vec<EventRow> {
    let show_worker = columns.contains(&EventColumn::WorkerName);
    let show_event_type = columns.contains(&EventColumn::EventType);
    let show_id = columns.contains(&EventColumn::Id);

    let mut ordered = events.iter().collect::<Vec<_>>();
    ordered.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
    ordered
        .into_iter()
        .map(|event| EventRow {
            timestamp: event.timestamp.format(ROW_TIMESTAMP_FORMAT).to_string(),
            worker_name: event.worker_name.clone().filter(|_| show_worker),
            event_type: event.event_type.clone().filter(|_| show_event_type),
            id: event.id.clone().filter(|_| show_id),
        })
        .collect()
}

pub fn render_dashboard_text(view: &DashboardView) -> String {
    let mut lines = vec![format!(
        "sioma dashboard: source={} generation={} records={} rows={}",
        view.source,
        view.generation,
        view.record_count,
        view.rows.len()
    )];

    for notice in &view.notices {
        lines.push(format!(
            "notice: severity={} reason_code={} message={}",
            notice.severity.as_str(),
            notice.reason_code,
            notice.message
        ));
    }

    if let Some(filter) = &view.filter {
        lines.push(format!(
            "filter: workers={} event_types={} start={} end={}",
            join_or_none(filter.workers.iter()),
            join_or_none(filter.event_types.iter()),
            filter.start,
            filter.end
        ));
    }

    let Some(summary) = &view.summary else {
        return lines.join("\n");
    };

    lines.push(format!(
        "summary: total={} entrances={} exits={} workers={} axis_max={}",
        summary.total_count,
        summary.entrance_count,
        summary.exit_count,
        summary.distinct_worker_count,
        summary.global_max_daily
    ));

    lines.push("event_types:".to_string());
    if summary.event_type_distribution.is_empty() {
        lines.push("  none".to_string());
    } else {
        for (event_type, count) in &summary.event_type_distribution {
            lines.push(format!("  {event_type} count={count}"));
        }
    }

    lines.push("workers:".to_string());
    if summary.per_worker_activity.is_empty() {
        lines.push("  none".to_string());
    } else {
        for activity in &summary.per_worker_activity {
            lines.push(format!("  {} count={}", activity.worker_name, activity.count));
        }
    }

    lines.push("daily_activity:".to_string());
    if summary.daily_activity.is_empty() {
        lines.push("  none".to_string());
    } else {
        for bucket in &summary.daily_activity {
            lines.push(format!(
                "  {} {:>4} {}",
                bucket.date,
                bucket.count,
                activity_bar(bucket.count, summary.global_max_daily)
            ));
        }
    }

    lines.join("\n")
}

pub fn render_events_text(rows: &[EventRow]) -> String {
    if rows.is_empty() {
        return "events: none".to_string();
    }
    rows.iter()
        .map(|row| {
            format!(
                "{} worker={} event_type={} id={}",
                row.timestamp,
                row.worker_name.as_deref().unwrap_or("-"),
                row.event_type.as_deref().unwrap_or("-"),
                row.id.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_facets_text(facets: &FilterFacets) -> String {
    let dates = match (facets.min_date, facets.max_date) {
        (Some(min), Some(max)) => format!("{min}..{max}"),
        _ => "none".to_string(),
    };
    [
        format!("workers: {}", join_or_none(facets.workers.iter())),
        format!("event_types: {}", join_or_none(facets.event_types.iter())),
        format!("dates: {dates}"),
    ]
    .join("\n")
}

fn join_or_none<'a>(values: impl Iterator<Item = &'a String>) -> String {
    let joined = values.map(String::as_str).collect::<Vec<_>>().join(",");
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined
    }
}

/// Bar scaled against the axis bound so bars keep their length across filters.
fn activity_bar(count: u64, axis_max: u64) -> String {
    if axis_max == 0 {
        return String::new();
    }
    let width = count.saturating_mul(BAR_WIDTH) / axis_max;
    "#".repeat(width as usize)
}
