//! Policy configuration
//!
//! Every empirically chosen constant in the system lives here as data:
//! audit weights and grade cuts, reinforcement factors, validator
//! confidence multipliers, completeness cadence and gap bands, and the
//! hosted-model call budget.

use crate::{ConfigError, VigilError, VigilResult};
use serde::{Deserialize, Serialize};

/// Scoring and reinforcement constants for the audit engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPolicy {
    /// Dimension weights, in order: data quality, task completion,
    /// accuracy, efficiency, innovation. Must sum to 1.0.
    pub weight_data_quality: f64,
    pub weight_task_completion: f64,
    pub weight_accuracy: f64,
    pub weight_efficiency: f64,
    pub weight_innovation: f64,

    /// Grade cuts on the overall [0,100] score.
    pub grade_a_plus: f64,
    pub grade_a: f64,
    pub grade_b: f64,
    pub grade_c: f64,

    /// Latency tiers for the efficiency dimension (seconds).
    pub latency_fast_secs: f64,
    pub latency_ok_secs: f64,
    pub latency_slow_secs: f64,

    /// Sub-score cutoffs for strengths/weaknesses reporting.
    pub strength_threshold: f64,
    pub weakness_threshold: f64,

    /// Penalty triggers (sub-score cutoffs) and point deductions.
    pub penalty_data_quality_below: f64,
    pub penalty_data_quality_points: f64,
    pub penalty_accuracy_below: f64,
    pub penalty_accuracy_points: f64,
    pub penalty_completion_below: f64,
    pub penalty_completion_points: f64,

    /// Reward triggers (sub-score cutoffs) and point additions.
    pub reward_data_quality_above: f64,
    pub reward_data_quality_points: f64,
    pub reward_accuracy_above: f64,
    pub reward_accuracy_points: f64,
    pub reward_efficiency_above: f64,
    pub reward_efficiency_points: f64,

    /// Reinforcement update: learning-rate boost below `low_score`
    /// (capped) and decay above `high_score` (floored).
    pub low_score: f64,
    pub high_score: f64,
    pub learning_rate_boost: f64,
    pub learning_rate_cap: f64,
    pub learning_rate_decay: f64,
    pub learning_rate_floor: f64,

    /// Penalty-multiplier boost below / decay above the given scores.
    pub penalty_boost_below: f64,
    pub penalty_decay_above: f64,
    pub penalty_multiplier_boost: f64,
    pub penalty_multiplier_cap: f64,
    pub penalty_multiplier_decay: f64,
    pub penalty_multiplier_floor: f64,

    /// Overall score at or above which an invocation counts as a success.
    pub success_threshold: f64,
}

/// Confidence multipliers and thresholds for the hallucination guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorPolicy {
    /// Relative divergence above which a quoted number contradicts the
    /// knowledge source.
    pub mismatch_ratio: f64,

    pub knowledge_mismatch_multiplier: f64,
    pub implausible_value_multiplier: f64,
    pub unknown_tag_multiplier: f64,
    pub unit_mismatch_multiplier: f64,
    pub future_tense_multiplier: f64,
    pub contradiction_multiplier: f64,
    pub overconfidence_multiplier: f64,
    /// Unmatched quoted number above `large_number_cutoff`.
    pub large_unmatched_multiplier: f64,
    /// Unmatched quoted number between `mid_number_cutoff` and the large
    /// cutoff: soft deduction, no issue.
    pub mid_unmatched_multiplier: f64,

    pub mid_number_cutoff: f64,
    pub large_number_cutoff: f64,

    /// Certainty phrases at or above this count, with zero hedges,
    /// flag overconfidence.
    pub certainty_phrase_limit: usize,

    /// Below this confidence a disclaimer is appended; below the strong
    /// threshold, a stronger one.
    pub disclaimer_threshold: f64,
    pub strong_disclaimer_threshold: f64,
}

/// Completeness-analysis cadence and gap bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessPolicy {
    pub cadence_minutes: i64,
    pub warning_gap_minutes: i64,
    pub critical_gap_minutes: i64,
    pub max_gap_periods: usize,
}

/// Hosted-model call budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmPolicy {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: i32,
    pub requests_per_minute: u32,
}

/// Master policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub audit: AuditPolicy,
    pub validator: ValidatorPolicy,
    pub completeness: CompletenessPolicy,
    pub llm: LlmPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            audit: AuditPolicy {
                weight_data_quality: 0.25,
                weight_task_completion: 0.30,
                weight_accuracy: 0.25,
                weight_efficiency: 0.15,
                weight_innovation: 0.05,
                grade_a_plus: 95.0,
                grade_a: 85.0,
                grade_b: 70.0,
                grade_c: 50.0,
                latency_fast_secs: 5.0,
                latency_ok_secs: 10.0,
                latency_slow_secs: 20.0,
                strength_threshold: 0.8,
                weakness_threshold: 0.6,
                penalty_data_quality_below: 0.5,
                penalty_data_quality_points: 10.0,
                penalty_accuracy_below: 0.5,
                penalty_accuracy_points: 15.0,
                penalty_completion_below: 0.6,
                penalty_completion_points: 25.0,
                reward_data_quality_above: 0.9,
                reward_data_quality_points: 15.0,
                reward_accuracy_above: 0.9,
                reward_accuracy_points: 20.0,
                reward_efficiency_above: 0.9,
                reward_efficiency_points: 12.0,
                low_score: 60.0,
                high_score: 85.0,
                learning_rate_boost: 1.2,
                learning_rate_cap: 0.3,
                learning_rate_decay: 0.95,
                learning_rate_floor: 0.01,
                penalty_boost_below: 50.0,
                penalty_decay_above: 80.0,
                penalty_multiplier_boost: 1.2,
                penalty_multiplier_cap: 3.0,
                penalty_multiplier_decay: 0.9,
                penalty_multiplier_floor: 1.0,
                success_threshold: 70.0,
            },
            validator: ValidatorPolicy {
                mismatch_ratio: 0.5,
                knowledge_mismatch_multiplier: 0.5,
                implausible_value_multiplier: 0.7,
                unknown_tag_multiplier: 0.8,
                unit_mismatch_multiplier: 0.5,
                future_tense_multiplier: 0.9,
                contradiction_multiplier: 0.6,
                overconfidence_multiplier: 0.85,
                large_unmatched_multiplier: 0.8,
                mid_unmatched_multiplier: 0.95,
                mid_number_cutoff: 100.0,
                large_number_cutoff: 10_000.0,
                certainty_phrase_limit: 3,
                disclaimer_threshold: 0.8,
                strong_disclaimer_threshold: 0.5,
            },
            completeness: CompletenessPolicy {
                cadence_minutes: 1,
                warning_gap_minutes: 10,
                critical_gap_minutes: 60,
                max_gap_periods: 10,
            },
            llm: LlmPolicy {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.3,
                max_tokens: 500,
                requests_per_minute: 60,
            },
        }
    }
}

impl PolicyConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `VIGIL_LLM_MODEL`: hosted model identifier
    /// - `VIGIL_LLM_TEMPERATURE`: sampling temperature
    /// - `VIGIL_LLM_MAX_TOKENS`: completion token budget
    /// - `VIGIL_DISCLAIMER_THRESHOLD`: validator disclaimer cutoff
    /// - `VIGIL_SUCCESS_THRESHOLD`: audit success cutoff
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(model) = std::env::var("VIGIL_LLM_MODEL") {
            if !model.trim().is_empty() {
                cfg.llm.model = model;
            }
        }
        if let Some(t) = parse_env::<f64>("VIGIL_LLM_TEMPERATURE") {
            cfg.llm.temperature = t;
        }
        if let Some(n) = parse_env::<i32>("VIGIL_LLM_MAX_TOKENS") {
            cfg.llm.max_tokens = n;
        }
        if let Some(t) = parse_env::<f64>("VIGIL_DISCLAIMER_THRESHOLD") {
            cfg.validator.disclaimer_threshold = t;
        }
        if let Some(t) = parse_env::<f64>("VIGIL_SUCCESS_THRESHOLD") {
            cfg.audit.success_threshold = t;
        }

        cfg
    }

    /// Validate the configuration.
    pub fn validate(&self) -> VigilResult<()> {
        let weight_sum = self.audit.weight_data_quality
            + self.audit.weight_task_completion
            + self.audit.weight_accuracy
            + self.audit.weight_efficiency
            + self.audit.weight_innovation;
        if (weight_sum - 1.0).abs() > 1e-9 {
            return Err(invalid(
                "audit.weights",
                format!("{weight_sum}"),
                "dimension weights must sum to 1.0",
            ));
        }

        for (field, value) in [
            ("validator.mismatch_ratio", self.validator.mismatch_ratio),
            (
                "validator.disclaimer_threshold",
                self.validator.disclaimer_threshold,
            ),
            (
                "validator.strong_disclaimer_threshold",
                self.validator.strong_disclaimer_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("{value}"), "must be in [0,1]"));
            }
        }

        for (field, value) in [
            (
                "validator.knowledge_mismatch_multiplier",
                self.validator.knowledge_mismatch_multiplier,
            ),
            (
                "validator.implausible_value_multiplier",
                self.validator.implausible_value_multiplier,
            ),
            (
                "validator.unknown_tag_multiplier",
                self.validator.unknown_tag_multiplier,
            ),
            (
                "validator.unit_mismatch_multiplier",
                self.validator.unit_mismatch_multiplier,
            ),
            (
                "validator.future_tense_multiplier",
                self.validator.future_tense_multiplier,
            ),
            (
                "validator.contradiction_multiplier",
                self.validator.contradiction_multiplier,
            ),
            (
                "validator.overconfidence_multiplier",
                self.validator.overconfidence_multiplier,
            ),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(field, format!("{value}"), "must be in (0,1]"));
            }
        }

        if self.completeness.cadence_minutes <= 0 {
            return Err(invalid(
                "completeness.cadence_minutes",
                self.completeness.cadence_minutes.to_string(),
                "cadence must be positive",
            ));
        }
        if self.completeness.critical_gap_minutes <= self.completeness.warning_gap_minutes {
            return Err(invalid(
                "completeness.critical_gap_minutes",
                self.completeness.critical_gap_minutes.to_string(),
                "critical band must exceed warning band",
            ));
        }

        if self.llm.max_tokens <= 0 {
            return Err(invalid(
                "llm.max_tokens",
                self.llm.max_tokens.to_string(),
                "max_tokens must be positive",
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid(
                "llm.temperature",
                self.llm.temperature.to_string(),
                "temperature must be in [0,2]",
            ));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn invalid(field: &str, value: String, reason: &str) -> VigilError {
    VigilError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
