//! Per-agent learning profiles and reinforcement updates

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use vigil_core::{AuditPolicy, AuditResult, LearningHistory, RECENT_SCORE_WINDOW};

/// Concurrent map of per-agent learning profiles.
///
/// Each profile sits behind its own mutex so audits for different agents
/// never contend; profiles are created on first audit and never removed.
pub struct LearningStore {
    profiles: RwLock<HashMap<String, Arc<Mutex<LearningHistory>>>>,
}

impl LearningStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
        }
    }

    /// The shared profile handle for an agent, created on first use.
    pub async fn profile(&self, agent: &str) -> Arc<Mutex<LearningHistory>> {
        if let Some(profile) = self.profiles.read().await.get(agent) {
            return profile.clone();
        }
        let mut profiles = self.profiles.write().await;
        profiles
            .entry(agent.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(LearningHistory::new(agent))))
            .clone()
    }

    /// A point-in-time copy of one agent's profile, if it exists.
    pub async fn snapshot(&self, agent: &str) -> Option<LearningHistory> {
        let profile = self.profiles.read().await.get(agent)?.clone();
        let history = profile.lock().await;
        Some(history.clone())
    }

    /// Names of all agents audited so far.
    pub async fn agents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for LearningStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one audit outcome to an agent's profile.
///
/// Poor scores boost the learning rate and penalty multiplier (capped);
/// strong scores decay them toward their floors. The derived metrics are
/// recomputed from the bounded recent-score window.
pub fn reinforce(history: &mut LearningHistory, result: &AuditResult, policy: &AuditPolicy) {
    history.record_score(result.overall);
    history.total_tasks += 1;
    if result.overall >= policy.success_threshold {
        history.successful_tasks += 1;
    } else {
        history.failed_tasks += 1;
    }

    if result.overall < policy.low_score {
        history.learning_rate =
            (history.learning_rate * policy.learning_rate_boost).min(policy.learning_rate_cap);
    } else if result.overall > policy.high_score {
        history.learning_rate =
            (history.learning_rate * policy.learning_rate_decay).max(policy.learning_rate_floor);
    }

    if result.overall < policy.penalty_boost_below {
        history.penalty_multiplier = (history.penalty_multiplier
            * policy.penalty_multiplier_boost)
            .min(policy.penalty_multiplier_cap);
    } else if result.overall > policy.penalty_decay_above {
        history.penalty_multiplier = (history.penalty_multiplier
            * policy.penalty_multiplier_decay)
            .max(policy.penalty_multiplier_floor);
    }

    history.adaptation_speed = 1.0 / (1.0 + variance(&history.last_scores(5)) / 100.0);
    history.consistency_score = (1.0 - variance(&history.last_scores(3)).sqrt() / 100.0).max(0.0);
    history.improvement_trend =
        (slope(&history.last_scores(RECENT_SCORE_WINDOW)) / 10.0).clamp(-1.0, 1.0);

    history.total_penalties += result.penalty_points;
    history.total_rewards += result.reward_points;
}

/// Population variance; 0 for fewer than two values.
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Least-squares slope of scores over their index; 0 for fewer than two.
fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vigil_core::{GradeBand, PolicyConfig};

    fn result_with_overall(overall: f64) -> AuditResult {
        AuditResult {
            agent: "agent".to_string(),
            query: "q".to_string(),
            data_quality: 0.5,
            task_completion: 0.5,
            accuracy: 0.5,
            efficiency: 0.5,
            innovation: 0.5,
            overall,
            grade: GradeBand::C,
            strengths: vec![],
            weaknesses: vec![],
            penalty_reasons: vec![],
            reward_reasons: vec![],
            penalty_points: 5.0,
            reward_points: 2.0,
            elapsed_secs: 1.0,
            audited_at: Utc::now(),
        }
    }

    #[test]
    fn test_low_score_boosts_learning_rate_and_penalty() {
        let policy = PolicyConfig::default().audit;
        let mut history = LearningHistory::new("agent");
        reinforce(&mut history, &result_with_overall(40.0), &policy);
        assert!((history.learning_rate - 0.12).abs() < 1e-9);
        assert!((history.penalty_multiplier - 1.2).abs() < 1e-9);
        assert_eq!(history.failed_tasks, 1);
        assert_eq!(history.successful_tasks, 0);
    }

    #[test]
    fn test_high_score_decays_learning_rate() {
        let policy = PolicyConfig::default().audit;
        let mut history = LearningHistory::new("agent");
        reinforce(&mut history, &result_with_overall(92.0), &policy);
        assert!((history.learning_rate - 0.095).abs() < 1e-9);
        assert_eq!(history.penalty_multiplier, 1.0);
        assert_eq!(history.successful_tasks, 1);
    }

    #[test]
    fn test_learning_rate_capped_and_floored() {
        let policy = PolicyConfig::default().audit;
        let mut history = LearningHistory::new("agent");
        for _ in 0..50 {
            reinforce(&mut history, &result_with_overall(10.0), &policy);
        }
        assert!(history.learning_rate <= policy.learning_rate_cap + 1e-12);
        assert!(history.penalty_multiplier <= policy.penalty_multiplier_cap + 1e-12);

        for _ in 0..200 {
            reinforce(&mut history, &result_with_overall(95.0), &policy);
        }
        assert!(history.learning_rate >= policy.learning_rate_floor - 1e-12);
        assert!(history.penalty_multiplier >= policy.penalty_multiplier_floor - 1e-12);
    }

    #[test]
    fn test_consistency_and_adaptation_for_steady_scores() {
        let policy = PolicyConfig::default().audit;
        let mut history = LearningHistory::new("agent");
        for _ in 0..5 {
            reinforce(&mut history, &result_with_overall(75.0), &policy);
        }
        assert!((history.consistency_score - 1.0).abs() < 1e-9);
        assert!((history.adaptation_speed - 1.0).abs() < 1e-9);
        assert!(history.improvement_trend.abs() < 1e-9);
    }

    #[test]
    fn test_improving_scores_yield_positive_trend() {
        let policy = PolicyConfig::default().audit;
        let mut history = LearningHistory::new("agent");
        for overall in [60.0, 65.0, 70.0, 75.0, 80.0] {
            reinforce(&mut history, &result_with_overall(overall), &policy);
        }
        assert!(history.improvement_trend > 0.0);
    }

    #[test]
    fn test_penalty_and_reward_totals_accumulate() {
        let policy = PolicyConfig::default().audit;
        let mut history = LearningHistory::new("agent");
        reinforce(&mut history, &result_with_overall(70.0), &policy);
        reinforce(&mut history, &result_with_overall(70.0), &policy);
        assert_eq!(history.total_penalties, 10.0);
        assert_eq!(history.total_rewards, 4.0);
    }

    #[tokio::test]
    async fn test_store_creates_profile_on_first_use() {
        let store = LearningStore::new();
        assert!(store.snapshot("ResearchAgent").await.is_none());
        let profile = store.profile("ResearchAgent").await;
        assert_eq!(profile.lock().await.agent, "ResearchAgent");
        assert_eq!(store.agents().await, vec!["ResearchAgent".to_string()]);
    }

    #[tokio::test]
    async fn test_store_returns_same_profile() {
        let store = LearningStore::new();
        let a = store.profile("AnalysisAgent").await;
        a.lock().await.total_tasks = 7;
        let b = store.profile("AnalysisAgent").await;
        assert_eq!(b.lock().await.total_tasks, 7);
    }

    #[test]
    fn test_slope_of_linear_series() {
        assert!((slope(&[1.0, 2.0, 3.0, 4.0]) - 1.0).abs() < 1e-12);
        assert_eq!(slope(&[5.0]), 0.0);
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[3.0]), 0.0);
        assert!((variance(&[2.0, 4.0]) - 1.0).abs() < 1e-12);
    }
}
