//! Per-question pipeline context
//!
//! `QueryContext` is the mutable aggregate one pipeline invocation owns
//! exclusively; nothing in it is shared across questions. Stages append
//! to it and never overwrite data attributed to an earlier stage, so the
//! audit engine can score stage-attributable deltas.

use crate::{
    AggregateRow, FiveW1H, QcRule, SensorReading, StoreStatistics, Timestamp, TranslatedQuery,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three sequential pipeline stages (plus the orchestrator itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Research,
    Analysis,
    Review,
    Orchestrator,
}

/// Closed set of question intents. Classification is total: anything that
/// matches no keyword set is `Adaptive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryIntent {
    CurrentStatus,
    HistoricalTrend,
    Comparison,
    Correlation,
    QcViolation,
    SystemOverview,
    Adaptive,
}

/// Shared severity scale for violations and data gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Minor,
    Warning,
    Critical,
}

/// Which bound a violating value crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationBound {
    Min,
    Max,
}

/// One sensor value breaching its QC rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub tag: String,
    pub value: f64,
    pub threshold: f64,
    pub bound: ViolationBound,
    pub severity: Severity,
    /// Distance from the crossed threshold, used to rank severity.
    pub severity_score: f64,
}

/// Per-tag rollup over a historical window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagStats {
    pub tag: String,
    pub count: i64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub stddev: Option<f64>,
}

/// Yesterday-vs-today aggregate comparison for one tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub tag: String,
    pub yesterday_avg: f64,
    pub today_avg: f64,
    pub change: f64,
    pub pct_change: f64,
}

/// Tagged payload variants, one per collection intent. A stage's output
/// shape is statically known to the next stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CollectedPayload {
    CurrentStatus {
        target_tags: Vec<String>,
        readings: Vec<SensorReading>,
        rules: Vec<QcRule>,
    },
    Historical {
        window_days: i64,
        target_tag: Option<String>,
        summary: Vec<TagStats>,
    },
    Comparison {
        rows: Vec<ComparisonRow>,
        top_changes: Vec<ComparisonRow>,
        current: Vec<SensorReading>,
        rules: Vec<QcRule>,
    },
    Correlation {
        tags: Vec<String>,
        stats: Vec<TagStats>,
        samples: Vec<SensorReading>,
        rules: Vec<QcRule>,
    },
    Violations {
        violations: Vec<Violation>,
        total_sensors: usize,
        violation_rate: f64,
        current: Vec<SensorReading>,
        rules: Vec<QcRule>,
    },
    Overview {
        current: Vec<SensorReading>,
        rules: Vec<QcRule>,
        statistics: StoreStatistics,
    },
    /// Result of the dynamic query translator, merged by the orchestrator.
    Aggregates {
        query: TranslatedQuery,
        rows: Vec<AggregateRow>,
        summary: String,
    },
}

/// A stage-attributed error note. Failures are recorded, never thrown
/// past the stage boundary; all three stages run regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageNote {
    pub stage: PipelineStage,
    pub message: String,
    pub at: Timestamp,
}

/// Value-distribution statistics over the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub mean: f64,
    pub range: f64,
    pub outliers: usize,
}

/// Correlation pattern derived by the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPattern {
    pub tags: Vec<String>,
    pub stats: Vec<TagStats>,
}

/// Violation rollup derived by the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub critical_count: usize,
    pub warning_count: usize,
    pub minor_count: usize,
    pub most_severe: Option<Violation>,
}

/// Insights accumulated by the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Insights {
    pub distribution: Option<Distribution>,
    pub correlation: Option<CorrelationPattern>,
    pub anomalies: Vec<AnomalySummary>,
    pub predictions: Vec<String>,
}

impl Insights {
    pub fn is_empty(&self) -> bool {
        self.distribution.is_none()
            && self.correlation.is_none()
            && self.anomalies.is_empty()
            && self.predictions.is_empty()
    }
}

/// Score plus free-text issues for one review dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub score: f64,
    pub issues: Vec<String>,
}

/// The review stage's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub data_validation: CheckOutcome,
    pub analysis_validation: CheckOutcome,
    pub logic_validation: CheckOutcome,
    pub recommendations: Vec<String>,
    pub overall_quality: f64,
    pub approved: bool,
}

/// Mutable per-question aggregate threaded through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    /// Invocation id (UUIDv7, timestamp-sortable).
    pub id: Uuid,
    pub query: String,
    pub intent: Option<QueryIntent>,
    pub collected: Vec<CollectedPayload>,
    pub stage_errors: Vec<StageNote>,
    pub insights: Insights,
    pub quality_report: Option<QualityReport>,
    /// Research stage's data-quality self-score in [0,1].
    pub data_quality_score: f64,
    /// Analysis stage's confidence in [0,1].
    pub confidence_score: f64,
    pub five_w1h: Option<FiveW1H>,
    pub final_response: Option<String>,
    pub created_at: Timestamp,
}

impl QueryContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            query: query.into(),
            intent: None,
            collected: Vec::new(),
            stage_errors: Vec::new(),
            insights: Insights::default(),
            quality_report: None,
            data_quality_score: 0.0,
            confidence_score: 0.0,
            five_w1h: None,
            final_response: None,
            created_at: Utc::now(),
        }
    }

    /// Append a collected payload. Payloads are append-only.
    pub fn collect(&mut self, payload: CollectedPayload) {
        self.collected.push(payload);
    }

    /// Record a stage failure without aborting the pipeline.
    pub fn note_error(&mut self, stage: PipelineStage, message: impl Into<String>) {
        self.stage_errors.push(StageNote {
            stage,
            message: message.into(),
            at: Utc::now(),
        });
    }

    /// True if any stage recorded a failure.
    pub fn has_errors(&self) -> bool {
        !self.stage_errors.is_empty()
    }

    /// The current snapshot readings, wherever a collection put them.
    pub fn current_readings(&self) -> &[SensorReading] {
        for payload in &self.collected {
            match payload {
                CollectedPayload::CurrentStatus { readings, .. } => return readings,
                CollectedPayload::Violations { current, .. } => return current,
                CollectedPayload::Overview { current, .. } => return current,
                CollectedPayload::Comparison { current, .. } => return current,
                _ => {}
            }
        }
        &[]
    }

    /// The QC rules collected alongside any payload.
    pub fn rules(&self) -> &[QcRule] {
        for payload in &self.collected {
            match payload {
                CollectedPayload::CurrentStatus { rules, .. }
                | CollectedPayload::Comparison { rules, .. }
                | CollectedPayload::Correlation { rules, .. }
                | CollectedPayload::Violations { rules, .. }
                | CollectedPayload::Overview { rules, .. } => return rules,
                _ => {}
            }
        }
        &[]
    }

    /// Collected violations, if the research stage produced any.
    pub fn violations(&self) -> &[Violation] {
        for payload in &self.collected {
            if let CollectedPayload::Violations { violations, .. } = payload {
                return violations;
            }
        }
        &[]
    }

    /// Violation rate in percent, when a violation scan was collected.
    pub fn violation_rate(&self) -> Option<f64> {
        for payload in &self.collected {
            if let CollectedPayload::Violations { violation_rate, .. } = payload {
                return Some(*violation_rate);
            }
        }
        None
    }

    /// Tags referenced by any collected payload, deduplicated in order.
    pub fn referenced_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        let mut push = |tag: &str| {
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        };
        for payload in &self.collected {
            match payload {
                CollectedPayload::CurrentStatus { target_tags, .. } => {
                    target_tags.iter().for_each(|t| push(t))
                }
                CollectedPayload::Correlation { tags: ts, .. } => {
                    ts.iter().for_each(|t| push(t))
                }
                CollectedPayload::Historical {
                    target_tag: Some(t),
                    ..
                } => push(t),
                CollectedPayload::Aggregates { query, .. } => {
                    query.tags.iter().for_each(|t| push(t))
                }
                _ => {}
            }
        }
        tags
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_empty() {
        let ctx = QueryContext::new("current status of D100");
        assert!(ctx.collected.is_empty());
        assert!(!ctx.has_errors());
        assert!(ctx.current_readings().is_empty());
        assert!(ctx.violations().is_empty());
        assert_eq!(ctx.violation_rate(), None);
    }

    #[test]
    fn test_note_error_records_stage() {
        let mut ctx = QueryContext::new("q");
        ctx.note_error(PipelineStage::Research, "snapshot query failed");
        assert!(ctx.has_errors());
        assert_eq!(ctx.stage_errors[0].stage, PipelineStage::Research);
    }

    #[test]
    fn test_current_readings_found_across_payloads() {
        let mut ctx = QueryContext::new("q");
        let reading = SensorReading::new("D100", 42.0, Utc::now());
        ctx.collect(CollectedPayload::Violations {
            violations: vec![],
            total_sensors: 1,
            violation_rate: 0.0,
            current: vec![reading.clone()],
            rules: vec![],
        });
        assert_eq!(ctx.current_readings(), &[reading]);
    }

    #[test]
    fn test_referenced_tags_deduplicated() {
        let mut ctx = QueryContext::new("q");
        ctx.collect(CollectedPayload::CurrentStatus {
            target_tags: vec!["D100".to_string(), "D101".to_string()],
            readings: vec![],
            rules: vec![],
        });
        ctx.collect(CollectedPayload::Correlation {
            tags: vec!["D101".to_string(), "D102".to_string()],
            stats: vec![],
            samples: vec![],
            rules: vec![],
        });
        assert_eq!(ctx.referenced_tags(), vec!["D100", "D101", "D102"]);
    }

    #[test]
    fn test_collect_appends_never_replaces() {
        let mut ctx = QueryContext::new("q");
        ctx.collect(CollectedPayload::CurrentStatus {
            target_tags: vec![],
            readings: vec![],
            rules: vec![],
        });
        ctx.collect(CollectedPayload::Historical {
            window_days: 7,
            target_tag: None,
            summary: vec![],
        });
        assert_eq!(ctx.collected.len(), 2);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Minor);
    }
}
