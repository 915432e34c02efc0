//! Review stage: quality verdict over the collected data and analysis
//!
//! Scores the data, the analysis, and the internal logic, derives
//! recommendations, and decides whether the context is approved for
//! response generation. Pure computation, never fails.

use vigil_core::{CheckOutcome, QualityReport, QueryContext, Severity};

pub struct ReviewStage;

impl ReviewStage {
    pub fn run(ctx: &mut QueryContext) {
        let data = check_data(ctx);
        let analysis = check_analysis(ctx);
        let logic = check_logic(ctx);
        let recommendations = recommendations(ctx);

        let overall_quality = (data.score + analysis.score + logic.score) / 3.0;
        let approved = overall_quality > 0.7 && logic.issues.is_empty();

        tracing::debug!(overall_quality, approved, "review stage complete");
        ctx.quality_report = Some(QualityReport {
            data_validation: data,
            analysis_validation: analysis,
            logic_validation: logic,
            recommendations,
            overall_quality,
            approved,
        });
    }
}

/// Clean collection, a healthy self-score, and rules to ground against.
fn check_data(ctx: &QueryContext) -> CheckOutcome {
    let mut score = 0.0;
    let mut issues = Vec::new();

    if ctx.has_errors() {
        issues.push(format!("{} stage error(s) during collection", ctx.stage_errors.len()));
    } else {
        score += 0.5;
    }
    if ctx.data_quality_score > 0.7 {
        score += 0.3;
    } else {
        issues.push("data-quality self-score is low".to_string());
    }
    if ctx.rules().is_empty() {
        issues.push("no QC rules available for grounding".to_string());
    } else {
        score += 0.2;
    }
    CheckOutcome { score, issues }
}

/// Insights present, confident, and pattern-backed.
fn check_analysis(ctx: &QueryContext) -> CheckOutcome {
    let mut score = 0.0;
    let mut issues = Vec::new();

    if ctx.insights.is_empty() {
        issues.push("analysis produced no insights".to_string());
    } else {
        score += 0.4;
    }
    if ctx.confidence_score > 0.7 {
        score += 0.3;
    } else {
        issues.push("analysis confidence is low".to_string());
    }
    if ctx.insights.distribution.is_some() || ctx.insights.correlation.is_some() {
        score += 0.3;
    } else {
        issues.push("no distribution or correlation pattern found".to_string());
    }
    CheckOutcome { score, issues }
}

/// Violations that the predictions never mention are a logic hole.
fn check_logic(ctx: &QueryContext) -> CheckOutcome {
    let mut score = 0.8;
    let mut issues = Vec::new();
    if !ctx.violations().is_empty() && ctx.insights.predictions.is_empty() {
        score -= 0.3;
        issues.push("violations were found but the outlook ignores them".to_string());
    }
    CheckOutcome { score, issues }
}

fn recommendations(ctx: &QueryContext) -> Vec<String> {
    let mut recommendations = Vec::new();
    if ctx.data_quality_score < 0.5 {
        recommendations.push("check the data collection pipeline".to_string());
    }
    let critical = ctx
        .violations()
        .iter()
        .filter(|v| v.severity == Severity::Critical)
        .count();
    if critical > 0 {
        recommendations.push(format!("{critical} sensor(s) need immediate action"));
    }
    if ctx.violation_rate().unwrap_or(0.0) > 10.0 {
        recommendations.push("shorten the monitoring interval".to_string());
    }
    recommendations
}

// =============================================================================
// TESTS
// =============================================================================
