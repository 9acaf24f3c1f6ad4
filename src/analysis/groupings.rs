/// Groups a flat reading list into one gauge reading per parameter.

use std::collections::BTreeMap;

use crate::model::{Parameter, Reading};
use crate::series::parse_timestamp;

/// The newest reading of each parameter present in `readings`.
///
/// Readings are compared by parsed timestamp; one whose timestamp does not
/// parse only wins when no parseable reading of that parameter exists. Among
/// equal timestamps the earlier entry (server order) is kept.
pub fn latest_by_parameter(readings: &[Reading]) -> BTreeMap<Parameter, Reading> {
    let mut latest: BTreeMap<Parameter, Reading> = BTreeMap::new();

    for reading in readings {
        let replace = match latest.get(&reading.parameter) {
            None => true,
            Some(current) => {
                match (parse_timestamp(&reading.timestamp), parse_timestamp(&current.timestamp)) {
                    (Some(new), Some(old)) => new > old,
                    (Some(_), None) => true,
                    _ => false,
                }
            }
        };
        if replace {
            latest.insert(reading.parameter, reading.clone());
        }
    }

    latest
}
