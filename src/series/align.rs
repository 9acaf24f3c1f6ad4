//! Time-axis alignment of independently fetched series.
//!
//! Each parameter's chart endpoint returns its own `labels`/`values` arrays,
//! and the five arrays rarely share timestamps: sensors report on different
//! cadences and some drop readings. The chart needs one x-axis, so the
//! series are projected onto the sorted union of all timestamps with `None`
//! wherever a series has no reading.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{SeriesInput, SeriesSet};

/// Merges labeled series onto one sorted, de-duplicated label axis.
///
/// - ISO 8601 labels sort lexicographically in chronological order, so the
///   axis is a plain string sort.
/// - A timestamp repeated within one input keeps the later value.
/// - Two inputs with the same key are merged; the later input wins on
///   shared timestamps.
/// - If `labels` and `values` differ in length, the unmatched tail is ignored.
///
/// No inputs, or only empty inputs, yield an empty `SeriesSet`.
pub fn align(inputs: &[SeriesInput]) -> SeriesSet {
    let mut by_key: BTreeMap<&str, BTreeMap<&str, Option<f64>>> = BTreeMap::new();
    let mut axis: BTreeSet<&str> = BTreeSet::new();

    for input in inputs {
        let points = by_key.entry(input.key.as_str()).or_default();
        for (label, value) in input.labels.iter().zip(input.values.iter()) {
            points.insert(label.as_str(), *value);
            axis.insert(label.as_str());
        }
    }

    if axis.is_empty() {
        return SeriesSet::empty();
    }

    let labels: Vec<String> = axis.iter().map(|l| l.to_string()).collect();
    let series = by_key
        .into_iter()
        .map(|(key, points)| {
            let projected = axis
                .iter()
                .map(|label| points.get(label).copied().flatten())
                .collect();
            (key.to_string(), projected)
        })
        .collect();

    SeriesSet { labels, series }
}

/// Splits an aligned set back into one input per series.
///
/// Aligning the result reproduces `set` exactly.
pub fn inputs_from(set: &SeriesSet) -> Vec<SeriesInput> {
    set.series
        .iter()
        .map(|(key, values)| SeriesInput::new(key.clone(), set.labels.clone(), values.clone()))
        .collect()
}
