//! Alert status: threshold checks, reading staleness, and the merge of
//! declared alerts with computed threshold severities.

pub mod severity;
pub mod stalenesses;
pub mod thresholds;
