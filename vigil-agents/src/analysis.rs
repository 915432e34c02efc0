//! Analysis stage: patterns, anomalies, predictions
//!
//! Pure computation over what research collected. No store access, no
//! model calls; the stage reads the context and appends insights plus a
//! confidence score.

use vigil_core::{
    AnomalySummary, CollectedPayload, CorrelationPattern, Distribution, QueryContext, Severity,
};

/// Violation rate (percent) above which immediate inspection is advised.
const INSPECTION_RATE: f64 = 20.0;
/// Violation rate above which monitoring should be tightened.
const MONITORING_RATE: f64 = 10.0;

pub struct AnalysisStage;

impl AnalysisStage {
    /// Derive insights from the collected payloads. Never fails: with
    /// nothing collected the insights stay empty and confidence low.
    pub fn run(ctx: &mut QueryContext) {
        let distribution = distribution(ctx);
        let correlation = correlation(ctx);
        let anomalies = anomalies(ctx);
        let predictions = predictions(ctx);

        let patterns_found = distribution.is_some() || correlation.is_some();
        let anomalies_found = !anomalies.is_empty();
        let predictions_found = !predictions.is_empty();

        ctx.insights.distribution = distribution;
        ctx.insights.correlation = correlation;
        ctx.insights.anomalies = anomalies;
        ctx.insights.predictions = predictions;

        // Confidence: pattern, anomaly, and prediction coverage weighted
        // 0.3/0.4/0.3. A clean anomaly scan counts for half.
        let patterns_score = if patterns_found { 1.0 } else { 0.3 };
        let anomalies_score = if anomalies_found {
            1.0
        } else if !ctx.current_readings().is_empty() {
            0.5
        } else {
            0.0
        };
        let predictions_score = if predictions_found { 1.0 } else { 0.0 };
        ctx.confidence_score =
            patterns_score * 0.3 + anomalies_score * 0.4 + predictions_score * 0.3;

        tracing::debug!(
            confidence = ctx.confidence_score,
            insights_empty = ctx.insights.is_empty(),
            "analysis stage complete"
        );
    }
}

/// Mean, range, and 2-sigma outlier count over the current snapshot.
fn distribution(ctx: &QueryContext) -> Option<Distribution> {
    let readings = ctx.current_readings();
    if readings.is_empty() {
        return None;
    }
    let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let stddev = variance.sqrt();
    let outliers = values
        .iter()
        .filter(|v| stddev > 0.0 && (**v - mean).abs() > 2.0 * stddev)
        .count();
    Some(Distribution {
        mean,
        range: max - min,
        outliers,
    })
}

fn correlation(ctx: &QueryContext) -> Option<CorrelationPattern> {
    for payload in &ctx.collected {
        if let CollectedPayload::Correlation { tags, stats, .. } = payload {
            return Some(CorrelationPattern {
                tags: tags.clone(),
                stats: stats.clone(),
            });
        }
    }
    None
}

/// Roll collected violations up by severity; the most severe one is the
/// furthest past its threshold at the highest severity.
fn anomalies(ctx: &QueryContext) -> Vec<AnomalySummary> {
    let violations = ctx.violations();
    if violations.is_empty() {
        return Vec::new();
    }
    let count_of = |severity: Severity| {
        violations
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    };
    let most_severe = violations
        .iter()
        .max_by(|a, b| {
            a.severity.cmp(&b.severity).then(
                a.severity_score
                    .partial_cmp(&b.severity_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        })
        .cloned();
    vec![AnomalySummary {
        critical_count: count_of(Severity::Critical),
        warning_count: count_of(Severity::Warning),
        minor_count: count_of(Severity::Minor),
        most_severe,
    }]
}

/// Near-term outlook from the violation rate.
fn predictions(ctx: &QueryContext) -> Vec<String> {
    let Some(rate) = ctx.violation_rate() else {
        return Vec::new();
    };
    if rate > INSPECTION_RATE {
        vec![format!(
            "Violation rate {rate:.1}% - immediate inspection of the affected sensors is recommended"
        )]
    } else if rate > MONITORING_RATE {
        vec![format!(
            "Violation rate {rate:.1}% - heightened monitoring is advised"
        )]
    } else {
        vec!["Violation rate within normal bounds - stable operation expected".to_string()]
    }
}

// =============================================================================
// TESTS
// =============================================================================
