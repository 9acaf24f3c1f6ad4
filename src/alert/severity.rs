//! Merging declared alerts with computed threshold severities.
//!
//! Two independent signals describe how bad things are: alerts an operator
//! (or the server's alert job) has declared, and the live threshold check of
//! each parameter's latest value. The banner shows one level, the max of the
//! two. Ties go to the declared alert so the banner keeps the operator's
//! wording.

use crate::alert::thresholds::{self, ThresholdBreach};
use crate::model::{
    CombinedStatus, DeclaredAlert, Headline, SeverityItem, StatusSource, ThresholdSeverity,
};
use crate::parameters;

/// Breach lines shown in the banner summary.
pub const EXPLANATION_LIMIT: usize = 3;

/// Combines both signals into one status.
///
/// - declared level: highest alert level, or normal when there are none
/// - threshold level: `threshold.level`, or normal when absent
/// - level: the max of the two
/// - source: `Alert` if declared >= threshold and declared > 0, `Threshold`
///   if threshold > declared, `None` when normal
///
/// Alerts are not filtered by the selected barangay here; pass the output of
/// `alerts_for_barangay` to restrict them.
pub fn reconcile(
    declared: &[DeclaredAlert],
    threshold: Option<&ThresholdSeverity>,
) -> CombinedStatus {
    let highest = highest_alert(declared);
    let declared_level = highest.map(|a| a.level).unwrap_or_default();
    let threshold_level = threshold.map(|t| t.level).unwrap_or_default();
    let level = declared_level.max(threshold_level);

    let source = if level.is_normal() {
        StatusSource::None
    } else if declared_level >= threshold_level {
        StatusSource::Alert
    } else {
        StatusSource::Threshold
    };

    let breaches = threshold.map(ranked_breaches).unwrap_or_default();
    let explanation = breaches
        .iter()
        .take(EXPLANATION_LIMIT)
        .map(|b| b.message.clone())
        .collect();

    let headline = match source {
        StatusSource::Alert | StatusSource::Both => highest.map(|alert| Headline {
            title: alert.title.clone(),
            description: alert.description.clone(),
        }),
        StatusSource::Threshold => threshold.and_then(threshold_headline),
        StatusSource::None => None,
    };

    CombinedStatus {
        level,
        declared_level,
        threshold_level,
        source,
        explanation,
        headline,
    }
}

/// The alert the banner speaks for: highest level, earliest in fetch order
/// among equals.
pub fn highest_alert(declared: &[DeclaredAlert]) -> Option<&DeclaredAlert> {
    declared.iter().fold(None, |best: Option<&DeclaredAlert>, alert| match best {
        Some(b) if b.level >= alert.level => Some(b),
        _ => Some(alert),
    })
}

/// Alerts that name `barangay_id`, plus area-wide alerts with no affected
/// list. Optional; callers decide whether the banner is barangay-exclusive.
pub fn alerts_for_barangay(declared: &[DeclaredAlert], barangay_id: u64) -> Vec<DeclaredAlert> {
    declared
        .iter()
        .filter(|a| a.affected_ids.is_empty() || a.affected_ids.contains(&barangay_id))
        .cloned()
        .collect()
}

/// Breaches for every item above normal, highest level first; payload order
/// among equals.
pub fn ranked_breaches(threshold: &ThresholdSeverity) -> Vec<ThresholdBreach> {
    let mut breaches: Vec<ThresholdBreach> = threshold
        .items
        .iter()
        .filter_map(thresholds::check_threshold)
        .collect();
    breaches.sort_by(|a, b| b.level.cmp(&a.level));
    breaches
}

fn threshold_headline(threshold: &ThresholdSeverity) -> Option<Headline> {
    let item = threshold
        .items
        .iter()
        .filter(|i| !i.level.is_normal())
        .fold(None, |best: Option<&SeverityItem>, item| match best {
            Some(b) if b.level >= item.level => Some(b),
            _ => Some(item),
        })?;
    let label = parameters::label(item.parameter);
    let unit = parameters::unit_or_default(item.parameter, &item.unit);
    Some(Headline {
        title: format!("{} Alert: {}", label, item.level.name()),
        description: format!(
            "{} has reached {} {}, which exceeds the {} threshold.",
            label,
            thresholds::format_value(item.latest_value),
            unit,
            item.level.name()
        ),
    })
}
