//! Raw document to [`WorkEvent`] normalization.
//!
//! Schema tolerance rules:
//! - a record without a convertible `timestamp` is dropped without error;
//! - the batch fails only when it is empty, or when no record at all carries
//!   a usable timestamp, and the two cases produce different errors;
//! - the output column set is decided per batch from the fields present.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use sioma_core::DisplayTimezone;
use sioma_types::{
    EventColumn, EventTable, PipelineError, RawEvent, RawValue, WorkEvent, FIELD_EVENT_TYPE,
    FIELD_ID, FIELD_SYNCED, FIELD_TIMESTAMP, FIELD_WORKER_NAME,
};

/// Normalized batch plus the counts needed for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBatch {
    pub table: EventTable,
    pub fetched: usize,
    pub dropped: usize,
}

pub fn normalize_events(
    raw_events: Vec<RawEvent>,
    timezone: DisplayTimezone,
) -> Result<NormalizedBatch, PipelineError> {
    let fetched = raw_events.len();
    if fetched == 0 {
        return Err(PipelineError::EmptySource);
    }

    let mut present = [false; EventColumn::PREFERRED_ORDER.len()];
    let mut events = Vec::with_capacity(fetched);
    for raw in raw_events {
        let Some(timestamp) = raw
            .timestamp_instant()
            .map(|instant| timezone.to_display(instant))
        else {
            tracing::trace!(source_id = %raw.source_id, "dropping record without usable timestamp");
            continue;
        };
        for (index, column) in EventColumn::PREFERRED_ORDER.iter().enumerate() {
            if matches!(column, EventColumn::Timestamp | EventColumn::SourceId)
                || raw.fields.contains_key(column.as_str())
            {
                present[index] = true;
            }
        }
        events.push(build_event(raw, timestamp));
    }

    if events.is_empty() {
        return Err(PipelineError::SchemaIncomplete { fetched });
    }

    let dropped = fetched - events.len();
    if dropped > 0 {
        tracing::debug!(fetched, dropped, "dropped records without usable timestamp");
    }
    let columns = EventColumn::PREFERRED_ORDER
        .iter()
        .zip(present)
        .filter_map(|(column, is_present)| is_present.then_some(*column))
        .collect();

    Ok(NormalizedBatch {
        table: EventTable { columns, events },
        fetched,
        dropped,
    })
}


fn build_event(raw: RawEvent, timestamp: DateTime<FixedOffset>) -> WorkEvent {
    let RawEvent {
        source_id,
        mut fields,
    } = raw;
    fields.remove(FIELD_TIMESTAMP);
    let worker_name = fields
        .remove(FIELD_WORKER_NAME)
        .and_then(|value| value.display_text());
    let event_type = fields
        .remove(FIELD_EVENT_TYPE)
        .and_then(|value| value.display_text());
    let synced = fields.remove(FIELD_SYNCED).and_then(|value| value.as_bool());
    let id = fields.remove(FIELD_ID).and_then(|value| value.display_text());
    let extra: BTreeMap<String, RawValue> = fields;

    WorkEvent {
        timestamp,
        worker_name,
        event_type,
        synced,
        id,
        source_id,
        extra,
    }
}
