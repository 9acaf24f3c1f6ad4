/// Reading organization for the gauge view.
///
/// The read API returns a flat, newest-first list of readings across all
/// parameters. Trend lines come from the chart endpoint instead, so the
/// only grouping needed here is "latest value per parameter".
///
/// Submodules:
/// - `groupings` — picks the gauge reading for each parameter.

pub mod groupings;
