//! Per-parameter threshold checking.
//!
//! The server computes each parameter's severity, but the payload carries
//! the configured thresholds too. This module checks a value against them
//! locally (for items that arrive without a level), renders the breach line
//! used in the status explanation, and computes progress toward the next
//! level for the full per-parameter status list.

use serde::Serialize;

use crate::model::{Parameter, SeverityItem, SeverityLevel, ThresholdLevels, ThresholdSeverity};
use crate::parameters;

/// A parameter whose latest value sits at or above an alert threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdBreach {
    pub parameter: Parameter,
    pub level: SeverityLevel,
    pub message: String,
}

/// Distance from the latest value to the next threshold up.
///
/// All fields are `None` (except `level`/`value` where known) when there is
/// no latest value to measure from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextLevel {
    pub level: Option<SeverityLevel>,
    pub value: Option<f64>,
    pub delta: Option<f64>,
    pub progress_pct: Option<f64>,
}

/// One row of the uncapped per-parameter status view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterStatus {
    pub parameter: Parameter,
    pub label: &'static str,
    pub unit: String,
    pub latest_value: Option<f64>,
    pub latest_timestamp: Option<String>,
    pub level: SeverityLevel,
    pub level_name: &'static str,
    pub thresholds: ThresholdLevels,
    pub next: NextLevel,
}

/// Highest level whose threshold is set and `<= value`.
///
/// A missing value is `NORMAL`. Unset levels are skipped rather than
/// treated as zero.
pub fn level_for_value(value: Option<f64>, thresholds: &ThresholdLevels) -> SeverityLevel {
    let Some(value) = value else {
        return SeverityLevel::NORMAL;
    };
    SeverityLevel::ALERT_LEVELS
        .iter()
        .rev()
        .copied()
        .find(|level| thresholds.value_for(*level).is_some_and(|t| value >= t))
        .unwrap_or(SeverityLevel::NORMAL)
}

/// Returns the breach for an item at an alert level, `None` when normal.
///
/// Message format:
/// `rainfall: 55.2 mm exceeds Emergency threshold (50 mm)`
pub fn check_threshold(item: &SeverityItem) -> Option<ThresholdBreach> {
    if item.level.is_normal() {
        return None;
    }
    let unit = parameters::unit_or_default(item.parameter, &item.unit);
    let message = format!(
        "{}: {} {} exceeds {} threshold ({} {})",
        item.parameter,
        format_value(item.latest_value),
        unit,
        item.level.name(),
        format_value(item.thresholds.value_for(item.level)),
        unit
    );
    Some(ThresholdBreach {
        parameter: item.parameter,
        level: item.level,
        message,
    })
}

/// Progress from the current level's threshold toward the next one.
///
/// - Normal: measured from 0 toward advisory.
/// - Advisory through emergency: from the current threshold to the next.
/// - Catastrophic: no next level, progress 100 %.
///
/// `delta = max(0, next - value)`; progress is clamped to 0–100 and rounded
/// to two decimals.
pub fn next_level(
    value: Option<f64>,
    level: SeverityLevel,
    thresholds: &ThresholdLevels,
) -> NextLevel {
    let Some(next) = level.next() else {
        return NextLevel {
            level: None,
            value: None,
            delta: Some(0.0),
            progress_pct: Some(100.0),
        };
    };
    let next_value = thresholds.value_for(next);

    let (Some(value), Some(next_value)) = (value, next_value) else {
        return NextLevel {
            level: Some(next),
            value: next_value,
            delta: None,
            progress_pct: None,
        };
    };

    let base = if level.is_normal() {
        Some(0.0)
    } else {
        thresholds.value_for(level)
    };
    let progress = base.map(|base| {
        let denom = (next_value - base).max(1e-9);
        round2(((value - base) / denom * 100.0).clamp(0.0, 100.0))
    });

    NextLevel {
        level: Some(next),
        value: Some(next_value),
        delta: Some((next_value - value).max(0.0)),
        progress_pct: progress,
    }
}

/// Every threshold item as a status row, in payload order, uncapped.
pub fn parameter_statuses(severity: &ThresholdSeverity) -> Vec<ParameterStatus> {
    severity
        .items
        .iter()
        .map(|item| ParameterStatus {
            parameter: item.parameter,
            label: parameters::label(item.parameter),
            unit: parameters::unit_or_default(item.parameter, &item.unit),
            latest_value: item.latest_value,
            latest_timestamp: item.latest_timestamp.clone(),
            level: item.level,
            level_name: item.level.name(),
            thresholds: item.thresholds.clone(),
            next: next_level(item.latest_value, item.level, &item.thresholds),
        })
        .collect()
}

/// Renders a reading for display; `--` when absent.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", round2(v)),
        None => "--".to_string(),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rainfall_thresholds() -> ThresholdLevels {
        ThresholdLevels {
            advisory: Some(10.0),
            watch: Some(20.0),
            warning: Some(30.0),
            emergency: Some(50.0),
            catastrophic: Some(80.0),
        }
    }

    fn item(value: Option<f64>, level: SeverityLevel) -> SeverityItem {
        SeverityItem {
            parameter: Parameter::Rainfall,
            unit: "mm".to_string(),
            latest_value: value,
            latest_timestamp: None,
            level,
            thresholds: rainfall_thresholds(),
        }
    }

    // --- Level computation ---------------------------------------------------

    #[test]
    fn test_value_below_advisory_is_normal() {
        assert_eq!(level_for_value(Some(9.9), &rainfall_thresholds()), SeverityLevel::NORMAL);
    }

    #[test]
    fn test_value_exactly_at_threshold_reaches_that_level() {
        assert_eq!(level_for_value(Some(30.0), &rainfall_thresholds()), SeverityLevel::WARNING);
        assert_eq!(
            level_for_value(Some(120.0), &rainfall_thresholds()),
            SeverityLevel::CATASTROPHIC
        );
    }

    #[test]
    fn test_missing_value_is_normal() {
        assert_eq!(level_for_value(None, &rainfall_thresholds()), SeverityLevel::NORMAL);
    }

    #[test]
    fn test_unset_levels_are_skipped() {
        let sparse = ThresholdLevels {
            advisory: Some(1.0),
            warning: Some(3.0),
            ..Default::default()
        };
        assert_eq!(level_for_value(Some(2.5), &sparse), SeverityLevel::ADVISORY);
        assert_eq!(level_for_value(Some(100.0), &sparse), SeverityLevel::WARNING);
    }

    // --- Breach message ------------------------------------------------------

    #[test]
    fn test_breach_message_format() {
        let breach = check_threshold(&item(Some(55.2), SeverityLevel::EMERGENCY))
            .expect("emergency level should breach");
        assert_eq!(breach.message, "rainfall: 55.2 mm exceeds Emergency threshold (50 mm)");
    }

    #[test]
    fn test_normal_item_has_no_breach() {
        assert!(check_threshold(&item(Some(2.0), SeverityLevel::NORMAL)).is_none());
    }

    // --- Next level progress -------------------------------------------------

    #[test]
    fn test_progress_from_zero_toward_advisory() {
        let next = next_level(Some(5.0), SeverityLevel::NORMAL, &rainfall_thresholds());
        assert_eq!(next.level, Some(SeverityLevel::ADVISORY));
        assert_eq!(next.delta, Some(5.0));
        assert_eq!(next.progress_pct, Some(50.0));
    }

    #[test]
    fn test_progress_between_warning_and_emergency() {
        let next = next_level(Some(35.0), SeverityLevel::WARNING, &rainfall_thresholds());
        assert_eq!(next.level, Some(SeverityLevel::EMERGENCY));
        assert_eq!(next.value, Some(50.0));
        assert_eq!(next.delta, Some(15.0));
        assert_eq!(next.progress_pct, Some(25.0));
    }

    #[test]
    fn test_catastrophic_has_no_next_level() {
        let next = next_level(Some(99.0), SeverityLevel::CATASTROPHIC, &rainfall_thresholds());
        assert_eq!(next.level, None);
        assert_eq!(next.progress_pct, Some(100.0));
    }

    #[test]
    fn test_missing_value_leaves_progress_unknown() {
        let next = next_level(None, SeverityLevel::NORMAL, &rainfall_thresholds());
        assert_eq!(next.level, Some(SeverityLevel::ADVISORY));
        assert_eq!(next.value, Some(10.0));
        assert_eq!(next.delta, None);
        assert_eq!(next.progress_pct, None);
    }

    #[test]
    fn test_parameter_statuses_are_uncapped() {
        let severity = ThresholdSeverity::from_items(vec![
            item(Some(12.0), SeverityLevel::ADVISORY),
            item(Some(22.0), SeverityLevel::WATCH),
            item(Some(32.0), SeverityLevel::WARNING),
            item(Some(52.0), SeverityLevel::EMERGENCY),
            item(Some(1.0), SeverityLevel::NORMAL),
        ]);
        let rows = parameter_statuses(&severity);
        assert_eq!(rows.len(), 5, "the full status list must not be capped");
        assert_eq!(rows[3].level_name, "Emergency");
        assert_eq!(rows[0].label, "Rainfall");
    }

    #[test]
    fn test_format_value_rounds_and_marks_missing() {
        assert_eq!(format_value(Some(50.0)), "50");
        assert_eq!(format_value(Some(1.23456)), "1.23");
        assert_eq!(format_value(None), "--");
    }
}
