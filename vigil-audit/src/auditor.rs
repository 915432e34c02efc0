//! Five-dimension stage scoring

use chrono::Utc;
use vigil_core::{AuditPolicy, AuditResult, GradeBand, QueryContext};

/// Scores one stage execution against the audit policy.
pub struct Auditor {
    policy: AuditPolicy,
}

impl Auditor {
    pub fn new(policy: AuditPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    /// Score a stage execution. `penalty_multiplier` comes from the
    /// agent's learning profile and scales deductions only, never rewards.
    pub fn score(
        &self,
        agent: &str,
        ctx: &QueryContext,
        elapsed_secs: f64,
        penalty_multiplier: f64,
    ) -> AuditResult {
        score_stage(&self.policy, agent, ctx, elapsed_secs, penalty_multiplier)
    }
}

/// Pure scoring function behind [`Auditor::score`].
pub fn score_stage(
    policy: &AuditPolicy,
    agent: &str,
    ctx: &QueryContext,
    elapsed_secs: f64,
    penalty_multiplier: f64,
) -> AuditResult {
    let data_quality = data_quality_score(ctx);
    let task_completion = task_completion_score(ctx);
    let accuracy = accuracy_score(ctx);
    let efficiency = efficiency_score(policy, elapsed_secs);
    let innovation = innovation_score(ctx);

    let weighted = 100.0
        * (data_quality * policy.weight_data_quality
            + task_completion * policy.weight_task_completion
            + accuracy * policy.weight_accuracy
            + efficiency * policy.weight_efficiency
            + innovation * policy.weight_innovation);

    let mut penalty_points = 0.0;
    let mut penalty_reasons = Vec::new();
    if data_quality < policy.penalty_data_quality_below {
        penalty_points += policy.penalty_data_quality_points;
        penalty_reasons.push(format!("data quality below {}", policy.penalty_data_quality_below));
    }
    if accuracy < policy.penalty_accuracy_below {
        penalty_points += policy.penalty_accuracy_points;
        penalty_reasons.push(format!("accuracy below {}", policy.penalty_accuracy_below));
    }
    if task_completion < policy.penalty_completion_below {
        penalty_points += policy.penalty_completion_points;
        penalty_reasons.push(format!(
            "task completion below {}",
            policy.penalty_completion_below
        ));
    }
    penalty_points *= penalty_multiplier.max(1.0);

    let mut reward_points = 0.0;
    let mut reward_reasons = Vec::new();
    if data_quality >= policy.reward_data_quality_above {
        reward_points += policy.reward_data_quality_points;
        reward_reasons.push("excellent data quality".to_string());
    }
    if accuracy >= policy.reward_accuracy_above {
        reward_points += policy.reward_accuracy_points;
        reward_reasons.push("excellent accuracy".to_string());
    }
    if efficiency >= policy.reward_efficiency_above {
        reward_points += policy.reward_efficiency_points;
        reward_reasons.push("excellent efficiency".to_string());
    }

    // Penalty and reward points are tracked on the record for the
    // reinforcement update; they never move the overall score itself.
    let overall = weighted.clamp(0.0, 100.0);

    let dims = [
        ("data quality", data_quality),
        ("task completion", task_completion),
        ("accuracy", accuracy),
        ("efficiency", efficiency),
        ("innovation", innovation),
    ];
    let strengths: Vec<String> = dims
        .iter()
        .filter(|(_, v)| *v >= policy.strength_threshold)
        .map(|(name, _)| (*name).to_string())
        .collect();
    let mut weaknesses: Vec<String> = dims
        .iter()
        .filter(|(_, v)| *v < policy.weakness_threshold)
        .map(|(name, _)| (*name).to_string())
        .collect();
    if innovation < 0.5 && efficiency < 0.7 {
        weaknesses.push("consider caching intermediate results".to_string());
    }

    AuditResult {
        agent: agent.to_string(),
        query: ctx.query.clone(),
        data_quality,
        task_completion,
        accuracy,
        efficiency,
        innovation,
        overall,
        grade: grade_for(policy, overall),
        strengths,
        weaknesses,
        penalty_reasons,
        reward_reasons,
        penalty_points,
        reward_points,
        elapsed_secs,
        audited_at: Utc::now(),
    }
}

/// Grade band for an overall score under the policy's cuts.
pub fn grade_for(policy: &AuditPolicy, overall: f64) -> GradeBand {
    if overall >= policy.grade_a_plus {
        GradeBand::APlus
    } else if overall >= policy.grade_a {
        GradeBand::A
    } else if overall >= policy.grade_b {
        GradeBand::B
    } else if overall >= policy.grade_c {
        GradeBand::C
    } else {
        GradeBand::F
    }
}

/// Data quality: the research stage's self-score, overridden to 0.2 when
/// any stage recorded a failure, floored at 0.3 when no sensor data was
/// collected (the stage may still have done useful work).
fn data_quality_score(ctx: &QueryContext) -> f64 {
    if ctx.has_errors() {
        return 0.2;
    }
    let score = ctx.data_quality_score.clamp(0.0, 1.0);
    if ctx.current_readings().is_empty() {
        score.max(0.3)
    } else {
        score
    }
}

/// Task completion: requirement coverage, completion depth, and clean
/// exception handling, weighted 0.4/0.3/0.3.
fn task_completion_score(ctx: &QueryContext) -> f64 {
    let requirement = if ctx.collected.is_empty() { 0.6 } else { 0.9 };
    let completion = if ctx.insights.is_empty() { 0.4 } else { 0.8 };
    let exception = if ctx.has_errors() { 0.3 } else { 0.7 };
    requirement * 0.4 + completion * 0.3 + exception * 0.3
}

/// Accuracy: 0.7 base, +0.2 with insights; blended with the review
/// stage's logic score when a quality report exists.
fn accuracy_score(ctx: &QueryContext) -> f64 {
    let mut accuracy = 0.7;
    if !ctx.insights.is_empty() {
        accuracy += 0.2;
    }
    if let Some(report) = &ctx.quality_report {
        accuracy = accuracy * 0.7 + report.logic_validation.score * 0.3;
    }
    accuracy.clamp(0.0, 1.0)
}

/// Efficiency: latency tier weighted with fixed resource-use and
/// stability terms (0.3/0.4/0.3).
fn efficiency_score(policy: &AuditPolicy, elapsed_secs: f64) -> f64 {
    let latency = if elapsed_secs < policy.latency_fast_secs {
        1.0
    } else if elapsed_secs < policy.latency_ok_secs {
        0.8
    } else if elapsed_secs < policy.latency_slow_secs {
        0.6
    } else {
        0.3
    };
    latency * 0.3 + 0.8 * 0.4 + 0.7 * 0.3
}

/// Innovation: insight and recommendation volume, each saturating at 3.
fn innovation_score(ctx: &QueryContext) -> f64 {
    let insights = &ctx.insights;
    let insight_count = insights.predictions.len()
        + insights.anomalies.len()
        + usize::from(insights.distribution.is_some())
        + usize::from(insights.correlation.is_some());
    let recommendations = ctx
        .quality_report
        .as_ref()
        .map(|r| r.recommendations.len())
        .unwrap_or(0);

    0.5 + (insight_count as f64 / 3.0).min(1.0) * 0.3
        + (recommendations as f64 / 3.0).min(1.0) * 0.2
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{
        CheckOutcome, CollectedPayload, Distribution, PipelineStage, PolicyConfig, QualityReport,
        SensorReading,
    };

    fn policy() -> AuditPolicy {
        PolicyConfig::default().audit
    }

    fn rich_context() -> QueryContext {
        let mut ctx = QueryContext::new("current status of all sensors");
        ctx.data_quality_score = 0.95;
        ctx.collect(CollectedPayload::CurrentStatus {
            target_tags: vec!["D100".to_string()],
            readings: vec![SensorReading::new("D100", 45.0, Utc::now())],
            rules: vec![],
        });
        ctx.insights.distribution = Some(Distribution {
            mean: 45.0,
            range: 0.0,
            outliers: 0,
        });
        ctx.insights.predictions = vec!["stable operation expected".to_string()];
        ctx.quality_report = Some(QualityReport {
            data_validation: CheckOutcome {
                score: 0.9,
                issues: vec![],
            },
            analysis_validation: CheckOutcome {
                score: 0.9,
                issues: vec![],
            },
            logic_validation: CheckOutcome {
                score: 0.8,
                issues: vec![],
            },
            recommendations: vec!["continue routine monitoring".to_string()],
            overall_quality: 0.87,
            approved: true,
        });
        ctx
    }

    #[test]
    fn test_rich_context_scores_well() {
        let result = score_stage(&policy(), "ResearchAgent", &rich_context(), 2.0, 1.0);
        assert!(result.overall >= 70.0, "overall was {}", result.overall);
        assert!(result.data_quality >= 0.9);
        assert!(result.reward_points > 0.0);
        assert!(result.is_success());
    }

    #[test]
    fn test_stage_errors_tank_data_quality() {
        let mut ctx = rich_context();
        ctx.note_error(PipelineStage::Research, "snapshot query failed");
        let result = score_stage(&policy(), "ResearchAgent", &ctx, 2.0, 1.0);
        assert_eq!(result.data_quality, 0.2);
        assert!(result
            .penalty_reasons
            .iter()
            .any(|r| r.contains("data quality")));
    }

    #[test]
    fn test_empty_context_floors_data_quality() {
        let ctx = QueryContext::new("q");
        let result = score_stage(&policy(), "ResearchAgent", &ctx, 2.0, 1.0);
        assert_eq!(result.data_quality, 0.3);
    }

    #[test]
    fn test_penalty_multiplier_scales_deductions() {
        let mut ctx = QueryContext::new("q");
        ctx.note_error(PipelineStage::Research, "boom");
        let single = score_stage(&policy(), "a", &ctx, 2.0, 1.0);
        let doubled = score_stage(&policy(), "a", &ctx, 2.0, 2.0);
        assert!(doubled.penalty_points > single.penalty_points);
        assert!((doubled.penalty_points - single.penalty_points * 2.0).abs() < 1e-9);
        assert!(doubled.overall <= single.overall);
    }

    #[test]
    fn test_overall_is_pure_weighted_sum() {
        // Rewards and penalties stay on the record; the overall score is
        // the weighted dimension sum alone, so grade bands and the
        // reinforcement thresholds see the unadjusted value.
        let p = policy();
        let result = score_stage(&p, "ResearchAgent", &rich_context(), 2.0, 1.0);
        let weighted = 100.0
            * (result.data_quality * p.weight_data_quality
                + result.task_completion * p.weight_task_completion
                + result.accuracy * p.weight_accuracy
                + result.efficiency * p.weight_efficiency
                + result.innovation * p.weight_innovation);
        assert!(result.reward_points > 0.0);
        assert!((result.overall - weighted).abs() < 1e-9, "overall {} != weighted {weighted}", result.overall);

        let mut ctx = QueryContext::new("q");
        ctx.note_error(PipelineStage::Research, "boom");
        let penalized = score_stage(&p, "ResearchAgent", &ctx, 2.0, 3.0);
        let weighted = 100.0
            * (penalized.data_quality * p.weight_data_quality
                + penalized.task_completion * p.weight_task_completion
                + penalized.accuracy * p.weight_accuracy
                + penalized.efficiency * p.weight_efficiency
                + penalized.innovation * p.weight_innovation);
        assert!(penalized.penalty_points > 0.0);
        assert!((penalized.overall - weighted).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_latency_tiers() {
        let p = policy();
        assert!(efficiency_score(&p, 1.0) > efficiency_score(&p, 7.0));
        assert!(efficiency_score(&p, 7.0) > efficiency_score(&p, 15.0));
        assert!(efficiency_score(&p, 15.0) > efficiency_score(&p, 60.0));
    }

    #[test]
    fn test_grade_cuts() {
        let p = policy();
        assert_eq!(grade_for(&p, 97.0), GradeBand::APlus);
        assert_eq!(grade_for(&p, 95.0), GradeBand::APlus);
        assert_eq!(grade_for(&p, 90.0), GradeBand::A);
        assert_eq!(grade_for(&p, 75.0), GradeBand::B);
        assert_eq!(grade_for(&p, 55.0), GradeBand::C);
        assert_eq!(grade_for(&p, 30.0), GradeBand::F);
    }

    #[test]
    fn test_strengths_and_weaknesses_reported() {
        let result = score_stage(&policy(), "a", &rich_context(), 2.0, 1.0);
        assert!(result.strengths.contains(&"data quality".to_string()));

        let poor = QueryContext::new("q");
        let result = score_stage(&policy(), "a", &poor, 60.0, 1.0);
        assert!(result.weaknesses.contains(&"task completion".to_string()));
    }
}
