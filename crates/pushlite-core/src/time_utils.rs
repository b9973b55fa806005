use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_to_ms)
        .unwrap_or_default()
}

/// Milliseconds elapsed since `started_unix_ms`, zero when the clock moved backwards.
pub fn elapsed_ms_since(started_unix_ms: u64) -> u64 {
    current_unix_timestamp_ms().saturating_sub(started_unix_ms)
}

pub fn duration_to_ms(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}
