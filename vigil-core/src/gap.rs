//! Completeness analysis types
//!
//! A `GapAnalysis` is computed on demand for a (sensor, window) pair and
//! not persisted.

use crate::{Severity, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quality grade derived from a completeness ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompletenessGrade {
    Critical,
    Poor,
    Average,
    Good,
    Excellent,
}

impl CompletenessGrade {
    /// Band boundaries: > 0.98 Excellent, >= 0.95 Good, >= 0.90 Average,
    /// >= 0.80 Poor, else Critical. A ratio of exactly 0.95 is Good.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.98 {
            CompletenessGrade::Excellent
        } else if ratio >= 0.95 {
            CompletenessGrade::Good
        } else if ratio >= 0.90 {
            CompletenessGrade::Average
        } else if ratio >= 0.80 {
            CompletenessGrade::Poor
        } else {
            CompletenessGrade::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CompletenessGrade::Excellent => "EXCELLENT",
            CompletenessGrade::Good => "GOOD",
            CompletenessGrade::Average => "AVERAGE",
            CompletenessGrade::Poor => "POOR",
            CompletenessGrade::Critical => "CRITICAL",
        }
    }
}

/// One contiguous run of missing samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
    pub duration_minutes: i64,
    pub severity: Severity,
}

/// Completeness report for one sensor over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapAnalysis {
    pub tag: String,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub expected_count: usize,
    pub actual_count: usize,
    /// actual / expected; 1.0 when nothing was expected.
    pub completeness_ratio: f64,
    pub missing: Vec<Timestamp>,
    /// Per-hour (0-23) completeness; 1.0 where nothing was expected.
    pub hourly: BTreeMap<u32, f64>,
    /// Per-day completeness, present only for windows of a day or more.
    pub daily: BTreeMap<String, f64>,
    /// Contiguous gaps, sorted by (severity, duration) descending,
    /// top 10 retained.
    pub gap_periods: Vec<GapPeriod>,
    pub grade: CompletenessGrade,
}

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Grade assignment is monotonic in the ratio.
        #[test]
        fn prop_grade_monotonic(a in 0.0f64..=1.0f64, b in 0.0f64..=1.0f64) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                CompletenessGrade::from_ratio(lo) <= CompletenessGrade::from_ratio(hi)
            );
        }
    }
}
