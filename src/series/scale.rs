//! Value scaling for a shared chart axis.
//!
//! Water level in metres and rainfall in millimetres differ by orders of
//! magnitude; on one y-axis the smaller series flattens to a line. The
//! normalized mode maps each series onto 0–100 by its own range.

use serde::{Deserialize, Serialize};

use crate::model::SeriesSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartScaling {
    #[default]
    Raw,
    Normalized,
}

/// Rescales every series in `set`; labels and `None` gaps are untouched.
///
/// Normalized: `(v - min) / (max - min) * 100` per series. A series whose
/// values are all equal maps to 0.
pub fn scale(set: &SeriesSet, scaling: ChartScaling) -> SeriesSet {
    match scaling {
        ChartScaling::Raw => set.clone(),
        ChartScaling::Normalized => SeriesSet {
            labels: set.labels.clone(),
            series: set
                .series
                .iter()
                .map(|(key, values)| (key.clone(), normalize(values)))
                .collect(),
        },
    }
}

fn normalize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present = values.iter().flatten().copied();
    let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let span = max - min;

    values
        .iter()
        .map(|v| {
            v.map(|v| {
                if span > 0.0 {
                    (v - min) / span * 100.0
                } else {
                    0.0
                }
            })
        })
        .collect()
}
