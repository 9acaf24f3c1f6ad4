//! Chart series reconciliation.
//!
//! Independently fetched per-parameter series are merged onto one time axis
//! (`align`), trimmed to the selected window (`range`), and optionally
//! rescaled for a shared chart axis (`scale`).

pub mod align;
pub mod range;
pub mod scale;

pub use align::{align, inputs_from};
pub use range::{filter, RangeKey, WindowSpec};
pub use scale::{scale, ChartScaling};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Naive layouts accepted after a trailing `Z` is stripped, or when the
/// label carries no offset at all. Offset-less labels are taken as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses an ISO 8601 label into UTC.
///
/// Accepts full RFC 3339, minute-precision labels such as
/// `2024-01-05T00:00Z` or `2024-01-05T08:00+08:00`, offset-less labels and
/// bare dates. Returns `None` for anything else.
pub fn parse_timestamp(label: &str) -> Option<DateTime<Utc>> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(label) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(label, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = label
        .strip_suffix('Z')
        .or_else(|| label.strip_suffix('z'))
        .unwrap_or(label);
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
