use std::time::{Duration, Instant};

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns true when at least `window` has passed between `since` and `now`.
///
/// A `now` earlier than `since` never counts as elapsed.
pub fn elapsed_at_least(since: Instant, now: Instant, window: Duration) -> bool {
    now.checked_duration_since(since)
        .map(|elapsed| elapsed >= window)
        .unwrap_or(false)
}

