//! Trailing time-window filtering for aligned series.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::parse_timestamp;
use crate::model::SeriesSet;

/// The chart range selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeKey {
    /// Most recent points; the point count is limited at fetch time.
    #[default]
    Latest,
    #[serde(alias = "7d")]
    Last7d,
    #[serde(alias = "30d")]
    Last30d,
    #[serde(alias = "365d", alias = "1y")]
    Last365d,
}

/// What to ask the chart endpoint for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    Latest { limit: usize },
    Days(u32),
}

impl RangeKey {
    /// Window length in days; `None` for `Latest`.
    pub fn days(self) -> Option<u32> {
        match self {
            RangeKey::Latest => None,
            RangeKey::Last7d => Some(7),
            RangeKey::Last30d => Some(30),
            RangeKey::Last365d => Some(365),
        }
    }

    pub fn window(self, latest_points: usize) -> WindowSpec {
        match self.days() {
            Some(days) => WindowSpec::Days(days),
            None => WindowSpec::Latest {
                limit: latest_points,
            },
        }
    }

    pub fn parse(key: &str) -> Option<RangeKey> {
        match key.trim().to_ascii_lowercase().as_str() {
            "latest" => Some(RangeKey::Latest),
            "7d" | "last7d" => Some(RangeKey::Last7d),
            "30d" | "last30d" => Some(RangeKey::Last30d),
            "365d" | "1y" | "last365d" => Some(RangeKey::Last365d),
            _ => None,
        }
    }
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeKey::Latest => write!(f, "latest"),
            RangeKey::Last7d => write!(f, "last7d"),
            RangeKey::Last30d => write!(f, "last30d"),
            RangeKey::Last365d => write!(f, "last365d"),
        }
    }
}

/// Restricts `set` to the trailing window named by `range`.
///
/// The window is anchored on the newest label, not on the wall clock, so a
/// sensor that stopped reporting a week ago still shows its last days of
/// data. Entries with `timestamp >= newest - N days` are kept, in every
/// series at once.
///
/// Fails open: an empty set or an unparseable newest label returns the
/// input unchanged. Individual labels that do not parse are kept.
pub fn filter(set: &SeriesSet, range: RangeKey) -> SeriesSet {
    let Some(days) = range.days() else {
        return set.clone();
    };
    let Some(newest) = set.labels.last().and_then(|l| parse_timestamp(l)) else {
        return set.clone();
    };
    let cutoff = newest - Duration::days(i64::from(days));

    let keep: Vec<bool> = set
        .labels
        .iter()
        .map(|label| parse_timestamp(label).is_none_or(|ts| ts >= cutoff))
        .collect();

    let labels = set
        .labels
        .iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|(l, _)| l.clone())
        .collect();
    let series = set
        .series
        .iter()
        .map(|(key, values)| {
            let kept = values
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| *v)
                .collect();
            (key.clone(), kept)
        })
        .collect();

    SeriesSet { labels, series }
}
