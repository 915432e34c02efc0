//! VIGIL Audit - Stage scoring and reinforcement
//!
//! Every pipeline stage execution is scored across five dimensions and
//! rolled into a per-agent learning profile. Scoring is deterministic for
//! a given context and policy; the profiles adapt learning rate and
//! penalty multiplier from the score history.

mod auditor;
mod learning;

pub use auditor::{grade_for, score_stage, Auditor};
pub use learning::LearningStore;

use std::sync::Arc;
use tokio::sync::Mutex;
use vigil_core::{AuditPolicy, AuditResult, LearningHistory, QueryContext};

/// Audit engine: scores a stage execution and feeds the outcome into the
/// agent's learning profile in one step.
pub struct AuditEngine {
    auditor: Auditor,
    store: LearningStore,
}

impl AuditEngine {
    pub fn new(policy: AuditPolicy) -> Self {
        Self {
            auditor: Auditor::new(policy),
            store: LearningStore::new(),
        }
    }

    /// Score one stage execution and update the agent's profile.
    ///
    /// The agent's current penalty multiplier scales the deductions, so a
    /// repeatedly failing agent is penalized harder.
    pub async fn audit(
        &self,
        agent: &str,
        ctx: &QueryContext,
        elapsed_secs: f64,
    ) -> AuditResult {
        let profile = self.store.profile(agent).await;
        let mut history = profile.lock().await;
        let result = self
            .auditor
            .score(agent, ctx, elapsed_secs, history.penalty_multiplier);
        learning::reinforce(&mut history, &result, self.auditor.policy());

        tracing::debug!(
            agent,
            overall = result.overall,
            grade = result.grade.label(),
            "stage audited"
        );
        result
    }

    /// The shared profile handle for one agent.
    pub async fn profile(&self, agent: &str) -> Arc<Mutex<LearningHistory>> {
        self.store.profile(agent).await
    }

    /// A point-in-time copy of one agent's profile.
    pub async fn profile_snapshot(&self, agent: &str) -> Option<LearningHistory> {
        self.store.snapshot(agent).await
    }

    pub fn store(&self) -> &LearningStore {
        &self.store
    }
}
