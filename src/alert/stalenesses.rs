/// Reading staleness detection.
///
/// Field sensors normally report every few minutes. During an active flood
/// a gauge that silently stopped reporting is dangerous: its last value keeps
/// rendering as if current. This module flags readings whose timestamp is
/// too old so the gauges can mark them.
///
/// Nothing here reads the wall clock; the orchestrator passes its own `now`.

use chrono::{DateTime, Utc};

use crate::series::parse_timestamp;

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Whether a reading taken at `timestamp` is past `max_age_minutes` at `now`.
///
/// The limit itself is still fresh; only an age strictly above it is stale.
/// Readings dated after `now` (sensor clock skew) are fresh. `Err` when the
/// label does not parse.
pub fn is_stale_at(
    timestamp: &str,
    max_age_minutes: u64,
    now: DateTime<Utc>,
) -> Result<bool, String> {
    let reading_time = parse_timestamp(timestamp)
        .ok_or_else(|| format!("unparseable reading timestamp '{}'", timestamp))?;
    let age_secs = (now - reading_time).num_seconds();
    Ok(age_secs > 0 && age_secs as u64 > max_age_minutes.saturating_mul(60))
}

/// Staleness for an optional timestamp with the fail-safe default applied:
/// no timestamp → unknown (`None`), unparseable → stale.
pub fn staleness_flag(
    timestamp: Option<&str>,
    max_age_minutes: u64,
    now: DateTime<Utc>,
) -> Option<bool> {
    timestamp.map(|ts| is_stale_at(ts, max_age_minutes, now).unwrap_or(true))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
