//! KPI and time-series aggregation over filtered events.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sioma_types::WorkEvent;

/// Headroom added above the busiest day when sizing a time-series axis.
pub const AXIS_MARGIN: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerActivity {
    pub worker_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_count: u64,
    pub entrance_count: u64,
    pub exit_count: u64,
    pub distinct_worker_count: u64,
    pub event_type_distribution: BTreeMap<String, u64>,
    /// Busiest worker first; equal counts ordered by worker name.
    pub per_worker_activity: Vec<WorkerActivity>,
    /// One bucket per calendar day from the first to the last filtered day.
    pub daily_activity: Vec<DailyBucket>,
    /// Axis bound from the unfiltered dataset; does not move with filters.
    pub global_max_daily: u64,
}

/// Summarizes `filtered`; only `global_max_daily` looks at `unfiltered`.
pub fn aggregate(filtered: &[WorkEvent], unfiltered: &[WorkEvent]) -> Summary {
    let mut entrance_count = 0u64;
    let mut exit_count = 0u64;
    let mut workers = BTreeSet::new();
    let mut event_type_distribution: BTreeMap<String, u64> = BTreeMap::new();
    let mut per_worker: BTreeMap<&str, u64> = BTreeMap::new();

    for event in filtered {
        if event.is_entrance() {
            entrance_count = entrance_count.saturating_add(1);
        }
        if event.is_exit() {
            exit_count = exit_count.saturating_add(1);
        }
        if let Some(event_type) = event.event_type.as_deref() {
            let count = event_type_distribution
                .entry(event_type.to_string())
                .or_default();
            *count = count.saturating_add(1);
        }
        if let Some(worker) = event.worker_name.as_deref() {
            workers.insert(worker);
            let count = per_worker.entry(worker).or_default();
            *count = count.saturating_add(1);
        }
    }

    let mut per_worker_activity = per_worker
        .into_iter()
        .map(|(worker_name, count)| WorkerActivity {
            worker_name: worker_name.to_string(),
            count,
        })
        .collect::<Vec<_>>();
    // Stable sort over name-ordered input keeps ties lexicographic.
    per_worker_activity.sort_by(|left, right| right.count.cmp(&left.count));

    Summary {
        total_count: filtered.len() as u64,
        entrance_count,
        exit_count,
        distinct_worker_count: workers.len() as u64,
        event_type_distribution,
        per_worker_activity,
        daily_activity: daily_activity(filtered),
        global_max_daily: global_max_daily(unfiltered),
    }
}

/// Dense per-day counts; empty input yields no buckets.
pub fn daily_activity(events: &[WorkEvent]) -> Vec<DailyBucket> {
    let counts = daily_counts(events);
    let (Some(first), Some(last)) = (
        counts.keys().next().copied(),
        counts.keys().next_back().copied(),
    ) else {
        return Vec::new();
    };

    first
        .iter_days()
        .take_while(|date| *date <= last)
        .map(|date| DailyBucket {
            date,
            count: counts.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

/// Busiest day of the whole dataset plus [`AXIS_MARGIN`].
pub fn global_max_daily(unfiltered: &[WorkEvent]) -> u64 {
    daily_counts(unfiltered)
        .into_values()
        .max()
        .unwrap_or(0)
        .saturating_add(AXIS_MARGIN)
}

fn daily_counts(events: &[WorkEvent]) -> BTreeMap<NaiveDate, u64> {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for event in events {
        let count = counts.entry(event.date()).or_default();
        *count = count.saturating_add(1);
    }
    counts
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use sioma_core::DisplayTimezone;

    use super::*;
    use crate::filter::{filter_events, DateRangeSelection, FilterFacets, FilterSelection};
    use crate::normalize::normalize_events;
    use crate::test_support::raw_event;

    fn normalized(raw: Vec<sioma_types::RawEvent>) -> Vec<WorkEvent> {
        normalize_events(raw, DisplayTimezone::utc())
            .expect("normalize")
            .table
            .events
    }

    fn five_events() -> Vec<WorkEvent> {
        normalized(vec![
            raw_event("a", "Ana", "entrada", 1, 8),
            raw_event("b", "Ana", "salida", 1, 17),
            raw_event("c", "Luis", "entrada", 2, 8),
            raw_event("d", "Luis", "salida", 3, 17),
            raw_event("e", "Luis", "entrada", 3, 18),
        ])
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).expect("date")
    }

    #[test]
    fn functional_unfiltered_summary_over_five_events() {
        let events = five_events();
        let summary = aggregate(&events, &events);
        assert_eq!(summary.total_count, 5);
        assert_eq!(summary.entrance_count, 3);
        assert_eq!(summary.exit_count, 2);
        assert_eq!(summary.distinct_worker_count, 2);
        assert_eq!(summary.event_type_distribution.values().sum::<u64>(), 5);
        assert_eq!(summary.daily_activity.len(), 3);
        assert_eq!(summary.global_max_daily, 4);
        assert_eq!(
            summary.per_worker_activity,
            vec![
                WorkerActivity {
                    worker_name: "Luis".to_string(),
                    count: 3
                },
                WorkerActivity {
                    worker_name: "Ana".to_string(),
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn unit_daily_activity_fills_gaps_with_zero_buckets() {
        let events = normalized(vec![
            raw_event("a", "Ana", "entrada", 1, 8),
            raw_event("b", "Ana", "salida", 4, 17),
        ]);
        let buckets = daily_activity(&events);
        assert_eq!(
            buckets,
            vec![
                DailyBucket { date: date(1), count: 1 },
                DailyBucket { date: date(2), count: 0 },
                DailyBucket { date: date(3), count: 0 },
                DailyBucket { date: date(4), count: 1 },
            ]
        );
    }

    #[test]
    fn unit_worker_ties_are_ordered_by_name() {
        let events = normalized(vec![
            raw_event("a", "Zoe", "entrada", 1, 8),
            raw_event("b", "Bea", "entrada", 1, 9),
            raw_event("c", "Milo", "entrada", 1, 10),
        ]);
        let summary = aggregate(&events, &events);
        let names = summary
            .per_worker_activity
            .iter()
            .map(|activity| activity.worker_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Bea", "Milo", "Zoe"]);
        assert_eq!(aggregate(&events, &events), summary);
    }

    #[test]
    fn regression_empty_dataset_keeps_axis_margin() {
        let summary = aggregate(&[], &[]);
        assert_eq!(summary.total_count, 0);
        assert!(summary.daily_activity.is_empty());
        assert!(summary.per_worker_activity.is_empty());
        assert_eq!(summary.global_max_daily, AXIS_MARGIN);
    }

    #[test]
    fn regression_missing_labels_are_excluded_from_breakdowns() {
        let mut events = five_events();
        events[0].event_type = None;
        events[1].worker_name = None;
        let summary = aggregate(&events, &events);
        assert_eq!(summary.total_count, 5);
        assert_eq!(summary.event_type_distribution.values().sum::<u64>(), 4);
        assert_eq!(
            summary
                .per_worker_activity
                .iter()
                .map(|activity| activity.count)
                .sum::<u64>(),
            4
        );
        assert_eq!(
            summary.daily_activity.iter().map(|bucket| bucket.count).sum::<u64>(),
            5
        );
    }

    #[test]
    fn regression_axis_bound_over_wide_span_uses_observed_days_only() {
        let mut events = normalized(vec![
            raw_event("a", "Ana", "entrada", 1, 8),
            raw_event("b", "Ana", "salida", 1, 17),
            raw_event("c", "Luis", "entrada", 1, 9),
        ]);
        let mut far_future = events[0].clone();
        far_future.source_id = "z".to_string();
        far_future.timestamp = chrono::DateTime::parse_from_rfc3339("9999-12-30T12:00:00+00:00")
            .expect("far future");
        let mut far_past = events[1].clone();
        far_past.source_id = "y".to_string();
        far_past.timestamp = chrono::DateTime::parse_from_rfc3339("0001-01-01T12:00:00+00:00")
            .expect("far past");
        events.push(far_future);
        events.push(far_past);

        assert_eq!(daily_counts(&events).len(), 3);
        assert_eq!(global_max_daily(&events), 3 + AXIS_MARGIN);
    }

    proptest! {
        #[test]
        fn property_daily_buckets_sum_to_total_and_axis_ignores_filters(
            days in proptest::collection::vec(1u32..=20, 0..60),
            start in 1u32..=20,
            span in 0u32..=10,
            keep_ana in any::<bool>(),
        ) {
            let raw = days
                .iter()
                .enumerate()
                .map(|(index, day)| {
                    let worker = if index % 2 == 0 { "Ana" } else { "Luis" };
                    let event_type = if index % 3 == 0 { "salida" } else { "entrada" };
                    raw_event(&format!("doc-{index}"), worker, event_type, *day, 8)
                })
                .collect::<Vec<_>>();
            let events = if raw.is_empty() { Vec::new() } else { normalized(raw) };
            let facets = FilterFacets::from_events(&events);
            let workers = if keep_ana { vec!["Ana"] } else { vec!["Ana", "Luis"] };
            let selection = FilterSelection {
                workers: Some(workers.into_iter().map(str::to_string).collect()),
                event_types: None,
                date_range: DateRangeSelection::between(date(start), date(start + span)),
            };
            let filter = selection.resolve(&facets).expect("resolve");
            let filtered = filter_events(&events, &filter);

            let summary = aggregate(&filtered, &events);
            let bucket_total = summary
                .daily_activity
                .iter()
                .map(|bucket| bucket.count)
                .sum::<u64>();
            prop_assert_eq!(bucket_total, summary.total_count);
            prop_assert_eq!(summary.global_max_daily, aggregate(&events, &events).global_max_daily);
            prop_assert!(summary.global_max_daily >= AXIS_MARGIN);
        }
    }
}
