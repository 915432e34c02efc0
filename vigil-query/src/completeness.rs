//! Data-completeness analysis
//!
//! Compares the samples actually stored for a sensor against the expected
//! collection cadence and reports the gaps: an overall ratio and grade,
//! per-hour and per-day breakdowns, and the worst contiguous gap periods.

use chrono::{Datelike, Duration, DurationRound, Timelike};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use vigil_core::{
    CompletenessGrade, CompletenessPolicy, GapAnalysis, GapPeriod, SensorReading, Severity,
    Timestamp, VigilResult,
};
use vigil_store::TelemetryStore;

/// Analyzes sample completeness for one sensor over one window.
pub struct CompletenessAnalyzer {
    store: Arc<dyn TelemetryStore>,
    policy: CompletenessPolicy,
}

impl CompletenessAnalyzer {
    pub fn new(store: Arc<dyn TelemetryStore>, policy: CompletenessPolicy) -> Self {
        Self { store, policy }
    }

    /// Fetch the raw history for `tag` and analyze it.
    pub async fn analyze(
        &self,
        tag: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> VigilResult<GapAnalysis> {
        let readings = self.store.raw_history(tag, start, end).await?;
        Ok(analyze_readings(tag, start, end, &readings, &self.policy))
    }
}

/// Pure analysis over an already-fetched sample set.
///
/// Timestamps are normalized to minute precision; a minute counts as
/// covered when at least one sample lands in it. The expected set is the
/// inclusive range of cadence-spaced minutes from `start` to `end`.
pub fn analyze_readings(
    tag: &str,
    start: Timestamp,
    end: Timestamp,
    readings: &[SensorReading],
    policy: &CompletenessPolicy,
) -> GapAnalysis {
    let cadence = Duration::minutes(policy.cadence_minutes.max(1));
    let window_start = minute_floor(start);
    let window_end = minute_floor(end);

    let covered: HashSet<Timestamp> = readings.iter().map(|r| minute_floor(r.ts)).collect();

    let mut expected_count = 0usize;
    let mut actual_count = 0usize;
    let mut missing = Vec::new();
    let mut hourly_expected: BTreeMap<u32, usize> = BTreeMap::new();
    let mut hourly_present: BTreeMap<u32, usize> = BTreeMap::new();
    let mut daily_expected: BTreeMap<String, usize> = BTreeMap::new();
    let mut daily_present: BTreeMap<String, usize> = BTreeMap::new();

    let mut cursor = window_start;
    while cursor <= window_end {
        expected_count += 1;
        let hour = cursor.hour();
        let day = format!(
            "{:04}-{:02}-{:02}",
            cursor.year(),
            cursor.month(),
            cursor.day()
        );
        *hourly_expected.entry(hour).or_default() += 1;
        *daily_expected.entry(day.clone()).or_default() += 1;

        if covered.contains(&cursor) {
            actual_count += 1;
            *hourly_present.entry(hour).or_default() += 1;
            *daily_present.entry(day).or_default() += 1;
        } else {
            missing.push(cursor);
        }
        cursor += cadence;
    }

    let completeness_ratio = if expected_count == 0 {
        1.0
    } else {
        actual_count as f64 / expected_count as f64
    };

    // Per-hour breakdown covers the full 0-23 range; hours with nothing
    // expected report 1.0.
    let hourly: BTreeMap<u32, f64> = (0..24)
        .map(|hour| {
            let expected = hourly_expected.get(&hour).copied().unwrap_or(0);
            let present = hourly_present.get(&hour).copied().unwrap_or(0);
            let ratio = if expected == 0 {
                1.0
            } else {
                present as f64 / expected as f64
            };
            (hour, ratio)
        })
        .collect();

    // Per-day breakdown only makes sense for windows of a day or more.
    let daily: BTreeMap<String, f64> = if end - start >= Duration::hours(24) {
        daily_expected
            .iter()
            .map(|(day, &expected)| {
                let present = daily_present.get(day).copied().unwrap_or(0);
                (day.clone(), present as f64 / expected.max(1) as f64)
            })
            .collect()
    } else {
        BTreeMap::new()
    };

    let gap_periods = collect_gap_periods(&missing, cadence, policy);

    GapAnalysis {
        tag: tag.to_string(),
        window_start,
        window_end,
        expected_count,
        actual_count,
        completeness_ratio,
        missing,
        hourly,
        daily,
        gap_periods,
        grade: CompletenessGrade::from_ratio(completeness_ratio),
    }
}

/// Group missing minutes into contiguous runs, band them by duration,
/// and keep the worst ones.
fn collect_gap_periods(
    missing: &[Timestamp],
    cadence: Duration,
    policy: &CompletenessPolicy,
) -> Vec<GapPeriod> {
    let mut periods = Vec::new();
    let mut run_start: Option<Timestamp> = None;
    let mut run_len = 0i64;

    let mut close_run = |start: Timestamp, len: i64, periods: &mut Vec<GapPeriod>| {
        let duration_minutes = len * cadence.num_minutes();
        let severity = if duration_minutes > policy.critical_gap_minutes {
            Severity::Critical
        } else if duration_minutes > policy.warning_gap_minutes {
            Severity::Warning
        } else {
            Severity::Minor
        };
        periods.push(GapPeriod {
            start,
            end: start + Duration::minutes(duration_minutes),
            duration_minutes,
            severity,
        });
    };

    let mut prev: Option<Timestamp> = None;
    for &ts in missing {
        match (run_start, prev) {
            (Some(_), Some(p)) if ts - p == cadence => {
                run_len += 1;
            }
            (Some(start), _) => {
                close_run(start, run_len, &mut periods);
                run_start = Some(ts);
                run_len = 1;
            }
            (None, _) => {
                run_start = Some(ts);
                run_len = 1;
            }
        }
        prev = Some(ts);
    }
    if let Some(start) = run_start {
        close_run(start, run_len, &mut periods);
    }

    // Worst first: severity, then duration.
    periods.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(b.duration_minutes.cmp(&a.duration_minutes))
    });
    periods.truncate(policy.max_gap_periods);
    periods
}

fn minute_floor(ts: Timestamp) -> Timestamp {
    ts.duration_trunc(Duration::minutes(1)).unwrap_or(ts)
}

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use vigil_core::SensorReading;

    fn policy() -> CompletenessPolicy {
        CompletenessPolicy {
            cadence_minutes: 1,
            warning_gap_minutes: 10,
            critical_gap_minutes: 60,
            max_gap_periods: 10,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The ratio stays in [0,1] and counts stay consistent.
        #[test]
        fn prop_ratio_bounds(present in proptest::collection::vec(0i64..120, 0..120)) {
            let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).single().unwrap();
            let readings: Vec<SensorReading> = present
                .iter()
                .map(|&m| SensorReading::new("D100", 0.0, t0 + Duration::minutes(m)))
                .collect();
            let analysis = analyze_readings(
                "D100",
                t0,
                t0 + Duration::minutes(119),
                &readings,
                &policy(),
            );
            prop_assert!((0.0..=1.0).contains(&analysis.completeness_ratio));
            prop_assert_eq!(
                analysis.expected_count,
                analysis.actual_count + analysis.missing.len()
            );
        }

        /// Adding samples never lowers the completeness ratio.
        #[test]
        fn prop_more_samples_never_worse(
            base in proptest::collection::vec(0i64..60, 0..60),
            extra in 0i64..60,
        ) {
            let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).single().unwrap();
            let to_readings = |minutes: &[i64]| -> Vec<SensorReading> {
                minutes
                    .iter()
                    .map(|&m| SensorReading::new("D100", 0.0, t0 + Duration::minutes(m)))
                    .collect()
            };
            let end = t0 + Duration::minutes(59);
            let before =
                analyze_readings("D100", t0, end, &to_readings(&base), &policy());
            let mut augmented = base.clone();
            augmented.push(extra);
            let after =
                analyze_readings("D100", t0, end, &to_readings(&augmented), &policy());
            prop_assert!(after.completeness_ratio >= before.completeness_ratio);
            prop_assert!(after.grade >= before.grade);
        }
    }
}
