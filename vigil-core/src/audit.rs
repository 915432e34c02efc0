//! Audit records and per-agent learning profiles
//!
//! `AuditResult` is created once per stage execution and never mutated.
//! `LearningHistory` is the long-lived per-agent profile; the bounded
//! recent-score window is enforced by the type itself.

use crate::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum retained recent scores per agent (oldest evicted first).
pub const RECENT_SCORE_WINDOW: usize = 10;

/// Letter-grade band for an overall audit score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GradeBand {
    F,
    C,
    B,
    A,
    APlus,
}

impl GradeBand {
    /// Short label, e.g. "A+".
    pub fn label(&self) -> &'static str {
        match self {
            GradeBand::APlus => "A+",
            GradeBand::A => "A",
            GradeBand::B => "B",
            GradeBand::C => "C",
            GradeBand::F => "F",
        }
    }

    /// Qualitative description attached to reports.
    pub fn description(&self) -> &'static str {
        match self {
            GradeBand::APlus => "EXCELLENT",
            GradeBand::A => "GOOD",
            GradeBand::B => "AVERAGE",
            GradeBand::C => "POOR",
            GradeBand::F => "FAIL",
        }
    }
}

/// Immutable per-(agent, invocation) scoring record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub agent: String,
    pub query: String,
    /// Sub-scores, each in [0,1].
    pub data_quality: f64,
    pub task_completion: f64,
    pub accuracy: f64,
    pub efficiency: f64,
    pub innovation: f64,
    /// Weighted overall score, clamped to [0,100].
    pub overall: f64,
    pub grade: GradeBand,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub penalty_reasons: Vec<String>,
    pub reward_reasons: Vec<String>,
    pub penalty_points: f64,
    pub reward_points: f64,
    pub elapsed_secs: f64,
    pub audited_at: Timestamp,
}

impl AuditResult {
    /// Whether this invocation counts as a success for the learning
    /// profile's task counters.
    pub fn is_success(&self) -> bool {
        self.overall >= 70.0
    }
}

/// Long-lived, monotonically updated learning profile for one agent.
///
/// Created on the first audit of a previously-unseen agent name and never
/// deleted. Updates must be serialized per agent (single-writer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningHistory {
    pub agent: String,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    /// FIFO of the most recent overall scores, capped at
    /// [`RECENT_SCORE_WINDOW`].
    pub recent_scores: VecDeque<f64>,
    pub best_score: f64,
    pub worst_score: f64,
    pub average_score: f64,
    pub learning_rate: f64,
    pub penalty_multiplier: f64,
    pub adaptation_speed: f64,
    pub consistency_score: f64,
    pub improvement_trend: f64,
    pub total_penalties: f64,
    pub total_rewards: f64,
    pub updated_at: Timestamp,
}

impl LearningHistory {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            total_tasks: 0,
            successful_tasks: 0,
            failed_tasks: 0,
            recent_scores: VecDeque::new(),
            best_score: 0.0,
            worst_score: 100.0,
            average_score: 0.0,
            learning_rate: 0.1,
            penalty_multiplier: 1.0,
            adaptation_speed: 1.0,
            consistency_score: 1.0,
            improvement_trend: 0.0,
            total_penalties: 0.0,
            total_rewards: 0.0,
            updated_at: Utc::now(),
        }
    }

    /// Record a new overall score, evicting the oldest entry once the
    /// window is full, and refresh best/worst/average.
    pub fn record_score(&mut self, score: f64) {
        if self.recent_scores.len() >= RECENT_SCORE_WINDOW {
            self.recent_scores.pop_front();
        }
        self.recent_scores.push_back(score);

        if score > self.best_score {
            self.best_score = score;
        }
        if score < self.worst_score {
            self.worst_score = score;
        }
        self.average_score =
            self.recent_scores.iter().sum::<f64>() / self.recent_scores.len() as f64;
        self.updated_at = Utc::now();
    }

    /// The last `n` scores, oldest first.
    pub fn last_scores(&self, n: usize) -> Vec<f64> {
        let len = self.recent_scores.len();
        self.recent_scores
            .iter()
            .skip(len.saturating_sub(n))
            .copied()
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
