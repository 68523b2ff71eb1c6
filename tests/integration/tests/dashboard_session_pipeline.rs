use std::{
    collections::{BTreeSet, VecDeque},
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use sioma_core::DisplayTimezone;
use sioma_dashboard::{DashboardSession, DateRangeSelection, FilterSelection};
use sioma_store::{EventSource, FileEventSource, SourceError, SourceResult};
use sioma_types::{
    RawEvent, RawValue, REASON_EMPTY_SOURCE, REASON_SCHEMA_INCOMPLETE, REASON_SOURCE_UNAVAILABLE,
};
use tokio::sync::Mutex as AsyncMutex;

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Replays one scripted batch per fetch; the last batch repeats.
struct ScriptedSource {
    batches: AsyncMutex<VecDeque<SourceResult<Vec<RawEvent>>>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    fn new(batches: Vec<SourceResult<Vec<RawEvent>>>) -> Self {
        Self {
            batches: AsyncMutex::new(VecDeque::from(batches)),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    async fn fetch(&self) -> SourceResult<Vec<RawEvent>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut batches = self.batches.lock().await;
        if batches.len() > 1 {
            return batches
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::Unavailable("script exhausted".into())));
        }
        match batches.front() {
            Some(Ok(events)) => Ok(events.clone()),
            Some(Err(error)) => Err(SourceError::Unavailable(error.to_string())),
            None => Err(SourceError::Unavailable("script exhausted".into())),
        }
    }
}

struct IsolatedWorkspace {
    root: PathBuf,
}

impl IsolatedWorkspace {
    fn new(label: &str) -> Self {
        let tick = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let count = WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "sioma-{label}-{}-{tick}-{count}",
            std::process::id()
        ));
        fs::create_dir_all(&root).expect("must create isolated workspace root");
        Self { root }
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for IsolatedWorkspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn event(id: &str, worker: &str, event_type: &str, day: u32, hour: u32) -> RawEvent {
    RawEvent::new(id)
        .with_field(
            "timestamp",
            RawValue::Timestamp(
                Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0)
                    .single()
                    .expect("valid instant"),
            ),
        )
        .with_field("workerName", RawValue::String(worker.to_string()))
        .with_field("eventType", RawValue::String(event_type.to_string()))
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).expect("valid date")
}

fn five_events() -> Vec<RawEvent> {
    vec![
        event("a", "Ana", "entrada", 1, 8),
        event("b", "Ana", "salida", 1, 17),
        event("c", "Luis", "entrada", 2, 8),
        event("d", "Luis", "salida", 3, 17),
        event("e", "Luis", "entrada", 3, 18),
    ]
}

#[tokio::test]
async fn integration_filter_changes_keep_axis_and_reload_picks_up_new_batch() {
    let mut second_batch = five_events();
    second_batch.push(event("f", "Marta", "entrada", 3, 9));
    let source = Arc::new(ScriptedSource::new(vec![Ok(five_events()), Ok(second_batch)]));
    let mut session = DashboardSession::new(source.clone(), DisplayTimezone::utc());

    let all = session
        .apply_filter(&FilterSelection::default())
        .await
        .expect("unfiltered view");
    let summary = all.summary.as_ref().expect("summary");
    assert_eq!(summary.total_count, 5);
    assert_eq!(summary.distinct_worker_count, 2);
    assert_eq!(summary.event_type_distribution.values().sum::<u64>(), 5);
    assert_eq!(summary.daily_activity.len(), 3);
    assert_eq!(summary.global_max_daily, 4);

    let narrowed = session
        .apply_filter(&FilterSelection {
            workers: Some(BTreeSet::from(["Ana".to_string()])),
            event_types: None,
            date_range: DateRangeSelection::between(date(1), date(2)),
        })
        .await
        .expect("narrowed view");
    let narrowed_summary = narrowed.summary.as_ref().expect("summary");
    assert_eq!(narrowed_summary.total_count, 2);
    assert_eq!(narrowed_summary.global_max_daily, 4);
    assert_eq!(narrowed.generation, all.generation);
    assert_eq!(source.fetch_count(), 1);

    session.reload();
    let reloaded = session
        .apply_filter(&FilterSelection::default())
        .await
        .expect("reloaded view");
    assert_eq!(source.fetch_count(), 2);
    assert!(reloaded.generation > all.generation);
    let reloaded_summary = reloaded.summary.as_ref().expect("summary");
    assert_eq!(reloaded_summary.total_count, 6);
    assert_eq!(reloaded_summary.global_max_daily, 5);
    assert_eq!(reloaded.facets.workers, vec!["Ana", "Luis", "Marta"]);
}

#[tokio::test]
async fn integration_missing_timestamp_is_dropped_without_schema_warning() {
    let mut batch = five_events()[..4].to_vec();
    batch.push(
        RawEvent::new("no-stamp")
            .with_field("workerName", RawValue::String("Ana".to_string()))
            .with_field("eventType", RawValue::String("entrada".to_string())),
    );
    let source = Arc::new(ScriptedSource::new(vec![Ok(batch)]));
    let mut session = DashboardSession::new(source, DisplayTimezone::utc());

    let view = session
        .apply_filter(&FilterSelection::default())
        .await
        .expect("view");
    assert_eq!(view.record_count, 4);
    assert!(view.notices.is_empty());
    assert!(view
        .rows
        .iter()
        .all(|row| !row.timestamp.is_empty()));
}

#[tokio::test]
async fn integration_degraded_sources_surface_distinct_notices() {
    let cases = vec![
        (Ok(Vec::new()), REASON_EMPTY_SOURCE, false),
        (
            Ok(vec![RawEvent::new("x")
                .with_field("workerName", RawValue::String("Ana".to_string()))]),
            REASON_SCHEMA_INCOMPLETE,
            true,
        ),
        (
            Err(SourceError::Unavailable("deadline exceeded".into())),
            REASON_SOURCE_UNAVAILABLE,
            true,
        ),
    ];

    for (batch, reason_code, is_warning) in cases {
        let source = Arc::new(ScriptedSource::new(vec![batch]));
        let mut session = DashboardSession::new(source, DisplayTimezone::utc());
        let view = session
            .apply_filter(&FilterSelection::default())
            .await
            .expect("degraded view");
        assert!(view.summary.is_none(), "{reason_code}");
        assert!(view.rows.is_empty(), "{reason_code}");
        assert_eq!(view.notices.len(), 1, "{reason_code}");
        assert_eq!(view.notices[0].reason_code, reason_code);
        assert_eq!(view.notices[0].is_warning(), is_warning, "{reason_code}");
    }
}

#[tokio::test]
async fn integration_file_export_uses_display_timezone_for_dates() {
    let workspace = IsolatedWorkspace::new("run-query-export");
    let export_path = workspace.root().join("work_logs.json");
    let payload = json!([
        {
            "document": {
                "name": "projects/sioma/databases/(default)/documents/work_logs/late",
                "fields": {
                    "timestamp": { "timestampValue": "2024-01-02T03:30:00Z" },
                    "workerName": { "stringValue": "Ana" },
                    "eventType": { "stringValue": "salida" }
                }
            },
            "readTime": "2024-01-05T00:00:00Z"
        },
        {
            "document": {
                "name": "projects/sioma/databases/(default)/documents/work_logs/early",
                "fields": {
                    "timestamp": { "timestampValue": "2024-01-01T13:00:00Z" },
                    "workerName": { "stringValue": "Ana" },
                    "eventType": { "stringValue": "entrada" }
                }
            },
            "readTime": "2024-01-05T00:00:00Z"
        },
        { "readTime": "2024-01-05T00:00:00Z" }
    ]);
    fs::write(&export_path, payload.to_string()).expect("write export");

    let bogota = "America/Bogota"
        .parse::<DisplayTimezone>()
        .expect("known timezone");
    let source = Arc::new(FileEventSource::new(export_path));
    let mut session = DashboardSession::new(source, bogota);
    let view = session
        .apply_filter(&FilterSelection::default())
        .await
        .expect("view");

    assert_eq!(view.record_count, 2);
    assert_eq!(view.facets.min_date, Some(date(1)));
    assert_eq!(view.facets.max_date, Some(date(1)));
    let summary = view.summary.as_ref().expect("summary");
    assert_eq!(summary.daily_activity.len(), 1);
    assert_eq!(summary.daily_activity[0].count, 2);
    assert_eq!(view.rows[0].timestamp, "2024-01-01 22:30:00");
}
