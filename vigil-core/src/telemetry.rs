//! Telemetry row types and QC rule evaluation

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// A single point-in-time sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Sensor tag, e.g. "D100"
    pub tag: String,
    pub value: f64,
    pub ts: Timestamp,
}

impl SensorReading {
    pub fn new(tag: impl Into<String>, value: f64, ts: Timestamp) -> Self {
        Self {
            tag: tag.into(),
            value,
            ts,
        }
    }
}

/// Tiered status of a sensor value against its QC rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorStatus {
    Normal,
    Warning,
    Critical,
}

/// Quality-control thresholds for one sensor.
///
/// The warning band sits inside the hard min/max band, and the critical
/// band sits outside it. Missing bounds are represented as unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcRule {
    pub tag: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub warn_min: Option<f64>,
    pub warn_max: Option<f64>,
    pub crit_min: Option<f64>,
    pub crit_max: Option<f64>,
}

impl QcRule {
    /// Rule with only warning and critical bands set.
    pub fn banded(
        tag: impl Into<String>,
        warn: (f64, f64),
        crit: (f64, f64),
    ) -> Self {
        Self {
            tag: tag.into(),
            min: None,
            max: None,
            warn_min: Some(warn.0),
            warn_max: Some(warn.1),
            crit_min: Some(crit.0),
            crit_max: Some(crit.1),
        }
    }

    /// Classify a value against this rule.
    ///
    /// The critical band is checked before the warning band so a critical
    /// breach is never reported as merely a warning.
    pub fn evaluate(&self, value: f64) -> SensorStatus {
        let below = |bound: Option<f64>| bound.is_some_and(|b| value < b);
        let above = |bound: Option<f64>| bound.is_some_and(|b| value > b);

        if below(self.crit_min) || above(self.crit_max) {
            SensorStatus::Critical
        } else if below(self.warn_min) || above(self.warn_max) {
            SensorStatus::Warning
        } else {
            SensorStatus::Normal
        }
    }

    /// Effective lower bound for violation reporting (critical first).
    pub fn lower_bound(&self) -> Option<f64> {
        self.crit_min.or(self.warn_min).or(self.min)
    }

    /// Effective upper bound for violation reporting (critical first).
    pub fn upper_bound(&self) -> Option<f64> {
        self.crit_max.or(self.warn_max).or(self.max)
    }
}

/// Physical category of a sensor, with its canonical display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Temperature,
    Pressure,
    Flow,
    Vibration,
    Power,
}

impl SensorKind {
    /// Resolve the canonical kind for a tag.
    ///
    /// Exact assignments first, then tag-prefix fallbacks for sensors
    /// commissioned after the initial map was written.
    pub fn for_tag(tag: &str) -> Option<SensorKind> {
        match tag {
            "D100" => Some(SensorKind::Temperature),
            "D101" => Some(SensorKind::Pressure),
            "D102" => Some(SensorKind::Flow),
            "D200" => Some(SensorKind::Vibration),
            "D300" => Some(SensorKind::Power),
            _ if tag.starts_with("D1") => Some(SensorKind::Temperature),
            _ if tag.starts_with("D2") => Some(SensorKind::Vibration),
            _ if tag.starts_with("D3") => Some(SensorKind::Power),
            _ => None,
        }
    }

    /// Canonical display unit for this kind.
    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::Pressure => "bar",
            SensorKind::Flow => "L/min",
            SensorKind::Vibration => "mm/s",
            SensorKind::Power => "%",
        }
    }

    /// Lowercase English name, used in unit-agreement checks.
    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Pressure => "pressure",
            SensorKind::Flow => "flow",
            SensorKind::Vibration => "vibration",
            SensorKind::Power => "power",
        }
    }
}

/// One row of a windowed aggregate query.
///
/// Column presence depends on which aggregate functions were requested;
/// a finest-resolution query fills `last` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregateRow {
    pub tag: String,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub sum: Option<f64>,
    pub last: Option<f64>,
    pub data_points: i64,
    pub earliest_bucket: Option<Timestamp>,
    pub latest_bucket: Option<Timestamp>,
}

/// Store-wide statistics, collected for system-overview questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStatistics {
    pub total_sensors: i64,
    pub total_records: i64,
    pub oldest_record: Option<Timestamp>,
    pub latest_record: Option<Timestamp>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> QcRule {
        QcRule::banded("D100", (10.0, 80.0), (0.0, 95.0))
    }

    #[test]
    fn test_evaluate_normal() {
        assert_eq!(rule().evaluate(50.0), SensorStatus::Normal);
    }

    #[test]
    fn test_evaluate_warning() {
        assert_eq!(rule().evaluate(85.0), SensorStatus::Warning);
        assert_eq!(rule().evaluate(5.0), SensorStatus::Warning);
    }

    #[test]
    fn test_evaluate_critical_beats_warning() {
        // 99.0 breaches both warn_max and crit_max; must report Critical.
        assert_eq!(rule().evaluate(99.0), SensorStatus::Critical);
        assert_eq!(rule().evaluate(-1.0), SensorStatus::Critical);
    }

    #[test]
    fn test_evaluate_unbounded_rule_is_normal() {
        let open = QcRule {
            tag: "D999".to_string(),
            min: None,
            max: None,
            warn_min: None,
            warn_max: None,
            crit_min: None,
            crit_max: None,
        };
        assert_eq!(open.evaluate(f64::MAX), SensorStatus::Normal);
    }

    #[test]
    fn test_sensor_kind_exact_map() {
        assert_eq!(SensorKind::for_tag("D100"), Some(SensorKind::Temperature));
        assert_eq!(SensorKind::for_tag("D101"), Some(SensorKind::Pressure));
        assert_eq!(SensorKind::for_tag("D102"), Some(SensorKind::Flow));
        assert_eq!(SensorKind::for_tag("D200"), Some(SensorKind::Vibration));
        assert_eq!(SensorKind::for_tag("D300"), Some(SensorKind::Power));
    }

    #[test]
    fn test_sensor_kind_prefix_fallback() {
        assert_eq!(SensorKind::for_tag("D103"), Some(SensorKind::Temperature));
        assert_eq!(SensorKind::for_tag("D201"), Some(SensorKind::Vibration));
        assert_eq!(SensorKind::for_tag("D301"), Some(SensorKind::Power));
        assert_eq!(SensorKind::for_tag("X999"), None);
    }

    #[test]
    fn test_sensor_kind_units() {
        assert_eq!(SensorKind::Temperature.unit(), "°C");
        assert_eq!(SensorKind::Pressure.unit(), "bar");
        assert_eq!(SensorKind::Flow.unit(), "L/min");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A value inside the warning band is always Normal.
        #[test]
        fn prop_inside_warning_band_is_normal(value in 10.0f64..=80.0f64) {
            let rule = QcRule::banded("D100", (10.0, 80.0), (0.0, 95.0));
            prop_assert_eq!(rule.evaluate(value), SensorStatus::Normal);
        }

        /// A value outside the critical band is never downgraded.
        #[test]
        fn prop_critical_never_downgraded(value in 95.1f64..1.0e6f64) {
            let rule = QcRule::banded("D100", (10.0, 80.0), (0.0, 95.0));
            prop_assert_eq!(rule.evaluate(value), SensorStatus::Critical);
        }
    }
}
