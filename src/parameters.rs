/// Parameter registry for the flood monitoring dashboard.
///
/// Defines the canonical list of sensor parameters the dashboard shows,
/// along with their display metadata. This is the single source of truth
/// for labels and fallback units; other modules should look parameters up
/// here rather than hardcoding display strings.

use crate::model::Parameter;

// ---------------------------------------------------------------------------
// Parameter metadata
// ---------------------------------------------------------------------------

/// Display metadata for a single monitored parameter.
pub struct ParameterInfo {
    pub parameter: Parameter,
    /// Human-readable label used in headlines and gauges.
    pub label: &'static str,
    /// Unit shown when a payload omits one.
    pub default_unit: &'static str,
    /// Whether a rising value raises flood risk. Used for ordering the
    /// threshold request; humidity and temperature are context only.
    pub flood_indicator: bool,
}

const TEMPERATURE: ParameterInfo = ParameterInfo {
    parameter: Parameter::Temperature,
    label: "Temperature",
    default_unit: "°C",
    flood_indicator: false,
};

const HUMIDITY: ParameterInfo = ParameterInfo {
    parameter: Parameter::Humidity,
    label: "Humidity",
    default_unit: "%",
    flood_indicator: false,
};

const RAINFALL: ParameterInfo = ParameterInfo {
    parameter: Parameter::Rainfall,
    label: "Rainfall",
    default_unit: "mm",
    flood_indicator: true,
};

const WATER_LEVEL: ParameterInfo = ParameterInfo {
    parameter: Parameter::WaterLevel,
    label: "Water Level",
    default_unit: "m",
    flood_indicator: true,
};

const WIND_SPEED: ParameterInfo = ParameterInfo {
    parameter: Parameter::WindSpeed,
    label: "Wind Speed",
    default_unit: "km/h",
    flood_indicator: false,
};

/// All parameters shown on the dashboard, in gauge order.
pub static PARAMETER_REGISTRY: &[ParameterInfo] =
    &[TEMPERATURE, HUMIDITY, RAINFALL, WATER_LEVEL, WIND_SPEED];

/// Looks up a parameter's metadata. A new `Parameter` variant fails to
/// compile here until it has an entry.
pub fn find_parameter(parameter: Parameter) -> &'static ParameterInfo {
    match parameter {
        Parameter::Temperature => &TEMPERATURE,
        Parameter::Humidity => &HUMIDITY,
        Parameter::Rainfall => &RAINFALL,
        Parameter::WaterLevel => &WATER_LEVEL,
        Parameter::WindSpeed => &WIND_SPEED,
    }
}

pub fn label(parameter: Parameter) -> &'static str {
    find_parameter(parameter).label
}

/// Returns `unit` unless it is blank, in which case the registry default.
pub fn unit_or_default(parameter: Parameter, unit: &str) -> String {
    if unit.trim().is_empty() {
        find_parameter(parameter).default_unit.to_string()
    } else {
        unit.to_string()
    }
}

/// Parameters requested from the threshold endpoint: flood indicators first.
pub fn threshold_request_order() -> Vec<Parameter> {
    let mut params: Vec<Parameter> = PARAMETER_REGISTRY.iter().map(|p| p.parameter).collect();
    params.sort_by_key(|p| !find_parameter(*p).flood_indicator);
    params
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_parameter_is_registered_exactly_once() {
        for p in Parameter::ALL {
            let count = PARAMETER_REGISTRY.iter().filter(|i| i.parameter == p).count();
            assert_eq!(count, 1, "parameter '{}' should be registered once, found {}", p, count);
        }
        assert_eq!(PARAMETER_REGISTRY.len(), Parameter::ALL.len());
    }

    #[test]
    fn test_lookup_agrees_with_registry_for_every_parameter() {
        for (p, info) in Parameter::ALL.into_iter().zip(PARAMETER_REGISTRY) {
            assert_eq!(info.parameter, p, "registry must follow gauge order");
            let found = find_parameter(p);
            assert_eq!(found.parameter, p, "lookup for '{}' returned '{}'", p, found.parameter);
            assert_eq!(found.label, info.label);
            assert_eq!(found.default_unit, info.default_unit);
        }
    }

    #[test]
    fn test_find_parameter_returns_correct_entry() {
        let info = find_parameter(Parameter::WaterLevel);
        assert_eq!(info.parameter, Parameter::WaterLevel);
        assert_eq!(info.label, "Water Level");
    }

    #[test]
    fn test_unit_or_default_falls_back_on_blank_unit() {
        assert_eq!(unit_or_default(Parameter::Rainfall, "  "), "mm");
        assert_eq!(unit_or_default(Parameter::Rainfall, "in"), "in");
    }

    #[test]
    fn test_threshold_request_order_puts_flood_indicators_first() {
        let order = threshold_request_order();
        assert_eq!(order.len(), 5);
        assert!(find_parameter(order[0]).flood_indicator);
        assert!(find_parameter(order[1]).flood_indicator);
        assert!(order[2..].iter().all(|p| !find_parameter(*p).flood_indicator));
    }
}
