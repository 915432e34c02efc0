//! Research stage: intent classification and data collection
//!
//! Classifies the question into one of the closed intents and collects
//! the matching payload from the store. Store failures are recorded on
//! the context and never propagate; the stage always completes and
//! always leaves a data-quality self-score behind.

use chrono::{Duration, Utc};
use futures_util::future;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use vigil_core::{
    CollectedPayload, ComparisonRow, PipelineStage, QcRule, QueryContext, QueryIntent,
    SensorReading, Severity, TagStats, Violation, ViolationBound, VigilResult,
};
use vigil_store::TelemetryStore;

static TAG_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"D\d{3}").expect("static pattern"));

/// Number of per-tag sample points attached to a correlation payload.
const CORRELATION_SAMPLES: usize = 10;
const CORRELATION_SAMPLE_TAGS: usize = 2;
const TOP_CHANGES: usize = 5;

pub struct ResearchStage {
    store: Arc<dyn TelemetryStore>,
}

impl ResearchStage {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    /// Keyword-driven intent classification. Total: anything unmatched is
    /// `Adaptive`. Earlier intent checks win ties.
    pub fn classify(question: &str) -> QueryIntent {
        let lowered = question.to_lowercase();
        let has = |keys: &[&str]| keys.iter().any(|k| lowered.contains(k));

        if has(&["상관", "관계", "correlation", "연관"]) {
            QueryIntent::Correlation
        } else if has(&["현재", "지금", "상태는"]) {
            QueryIntent::CurrentStatus
        } else if has(&["어제", "비교", "변했", "변화", "compare", "change"]) {
            QueryIntent::Comparison
        } else if has(&["일주일", "트렌드", "추세"]) {
            QueryIntent::HistoricalTrend
        } else if has(&["위반", "경고", "초과", "임계"]) {
            QueryIntent::QcViolation
        } else if has(&["전체", "요약", "종합", "전반적"]) {
            QueryIntent::SystemOverview
        } else {
            QueryIntent::Adaptive
        }
    }

    /// Classify, collect, self-score. Never fails.
    pub async fn run(&self, ctx: &mut QueryContext) {
        let intent = Self::classify(&ctx.query);
        ctx.intent = Some(intent);
        tracing::debug!(?intent, query = %ctx.query, "research stage collecting");

        let outcome = match intent {
            QueryIntent::CurrentStatus | QueryIntent::Adaptive => {
                self.collect_current(ctx).await
            }
            QueryIntent::Comparison => self.collect_comparison(ctx).await,
            QueryIntent::Correlation => self.collect_correlation(ctx).await,
            QueryIntent::HistoricalTrend => self.collect_historical(ctx).await,
            QueryIntent::QcViolation => self.collect_violations(ctx).await,
            QueryIntent::SystemOverview => self.collect_overview(ctx).await,
        };
        if let Err(err) = outcome {
            tracing::warn!(%err, "research collection failed");
            ctx.note_error(PipelineStage::Research, err.to_string());
        }

        // Self-score: data collected cleanly, a payload present, and QC
        // rules available for grounding.
        let mut score = 0.0;
        if !ctx.has_errors() {
            score += 0.5;
        }
        if !ctx.collected.is_empty() {
            score += 0.3;
        }
        if !ctx.rules().is_empty() {
            score += 0.2;
        }
        ctx.data_quality_score = score;
    }

    /// Tags named in the question, falling back to every active tag.
    async fn target_tags(&self, question: &str) -> VigilResult<Vec<String>> {
        let active = self.store.active_tags().await?;
        let named: Vec<String> = TAG_TOKEN
            .find_iter(&question.to_uppercase())
            .map(|m| m.as_str().to_string())
            .filter(|t| active.iter().any(|a| a == t))
            .collect();
        Ok(if named.is_empty() { active } else { named })
    }

    async fn collect_current(&self, ctx: &mut QueryContext) -> VigilResult<()> {
        let tags = self.target_tags(&ctx.query).await?;
        let readings = self.store.latest_snapshot(Some(&tags)).await?;
        let rules = self.store.qc_rules(Some(&tags)).await?;
        ctx.collect(CollectedPayload::CurrentStatus {
            target_tags: tags,
            readings,
            rules,
        });
        Ok(())
    }

    async fn collect_comparison(&self, ctx: &mut QueryContext) -> VigilResult<()> {
        let tags = self.target_tags(&ctx.query).await?;
        let now = Utc::now();
        let yesterday = self
            .store
            .windowed_aggregate(
                vigil_core::Resolution::Hour,
                now - Duration::days(2),
                now - Duration::days(1),
                &tags,
                &[vigil_core::AggregateFn::Avg],
            )
            .await?;
        let today = self
            .store
            .windowed_aggregate(
                vigil_core::Resolution::Hour,
                now - Duration::days(1),
                now,
                &tags,
                &[vigil_core::AggregateFn::Avg],
            )
            .await?;

        let mut rows = Vec::new();
        for y in &yesterday {
            let Some(t) = today.iter().find(|t| t.tag == y.tag) else {
                continue;
            };
            let (Some(y_avg), Some(t_avg)) = (y.avg, t.avg) else {
                continue;
            };
            let change = t_avg - y_avg;
            let pct_change = if y_avg.abs() > f64::EPSILON {
                change / y_avg * 100.0
            } else {
                0.0
            };
            rows.push(ComparisonRow {
                tag: y.tag.clone(),
                yesterday_avg: y_avg,
                today_avg: t_avg,
                change,
                pct_change,
            });
        }

        let mut top_changes = rows.clone();
        top_changes.sort_by(|a, b| {
            b.pct_change
                .abs()
                .partial_cmp(&a.pct_change.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        top_changes.truncate(TOP_CHANGES);

        let current = self.store.latest_snapshot(Some(&tags)).await?;
        let rules = self.store.qc_rules(Some(&tags)).await?;
        ctx.collect(CollectedPayload::Comparison {
            rows,
            top_changes,
            current,
            rules,
        });
        Ok(())
    }

    async fn collect_correlation(&self, ctx: &mut QueryContext) -> VigilResult<()> {
        let tags = self.target_tags(&ctx.query).await?;
        if tags.len() < CORRELATION_SAMPLE_TAGS {
            // A correlation needs two sides; degrade to a status view.
            return self.collect_current(ctx).await;
        }
        let now = Utc::now();
        let start = now - Duration::days(30);
        let rows = self
            .store
            .windowed_aggregate(vigil_core::Resolution::Hour, start, now, &tags, &[])
            .await?;
        let stats = rows.iter().map(tag_stats_from_row).collect();

        let histories = future::try_join_all(
            tags.iter()
                .take(CORRELATION_SAMPLE_TAGS)
                .map(|tag| self.store.raw_history(tag, start, now)),
        )
        .await?;
        let mut samples = Vec::new();
        for mut history in histories {
            let keep = history.len().saturating_sub(CORRELATION_SAMPLES);
            samples.extend(history.drain(keep..));
        }

        let rules = self.store.qc_rules(Some(&tags)).await?;
        ctx.collect(CollectedPayload::Correlation {
            tags,
            stats,
            samples,
            rules,
        });
        Ok(())
    }

    async fn collect_historical(&self, ctx: &mut QueryContext) -> VigilResult<()> {
        let window_days = historical_days(&ctx.query);
        let tags = self.target_tags(&ctx.query).await?;
        let target_tag = TAG_TOKEN
            .find(&ctx.query.to_uppercase())
            .map(|m| m.as_str().to_string());
        let now = Utc::now();
        let rows = self
            .store
            .windowed_aggregate(
                vigil_core::Resolution::Hour,
                now - Duration::days(window_days),
                now,
                &tags,
                &[],
            )
            .await?;
        ctx.collect(CollectedPayload::Historical {
            window_days,
            target_tag,
            summary: rows.iter().map(tag_stats_from_row).collect(),
        });
        Ok(())
    }

    async fn collect_violations(&self, ctx: &mut QueryContext) -> VigilResult<()> {
        let readings = self.store.latest_snapshot(None).await?;
        let rules = self.store.qc_rules(None).await?;
        let violations = scan_violations(&readings, &rules);
        let total_sensors = readings.len();
        let violation_rate = if total_sensors == 0 {
            0.0
        } else {
            violations.len() as f64 / total_sensors as f64 * 100.0
        };
        ctx.collect(CollectedPayload::Violations {
            violations,
            total_sensors,
            violation_rate,
            current: readings,
            rules,
        });
        Ok(())
    }

    async fn collect_overview(&self, ctx: &mut QueryContext) -> VigilResult<()> {
        let current = self.store.latest_snapshot(None).await?;
        let rules = self.store.qc_rules(None).await?;
        let statistics = self.store.statistics().await?;
        ctx.collect(CollectedPayload::Overview {
            current,
            rules,
            statistics,
        });
        Ok(())
    }
}

/// Window length for a historical question.
fn historical_days(question: &str) -> i64 {
    if question.contains("일주일") {
        7
    } else if question.contains("어제") {
        1
    } else if question.contains("한달") {
        30
    } else {
        7
    }
}

fn tag_stats_from_row(row: &vigil_core::AggregateRow) -> TagStats {
    TagStats {
        tag: row.tag.clone(),
        count: row.data_points,
        min: row.min.unwrap_or(0.0),
        max: row.max.unwrap_or(0.0),
        avg: row.avg.unwrap_or(0.0),
        stddev: None,
    }
}

/// Evaluate every reading against its rule, critical bands first so a
/// breach is reported at its worst severity.
pub fn scan_violations(readings: &[SensorReading], rules: &[QcRule]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for reading in readings {
        let Some(rule) = rules.iter().find(|r| r.tag == reading.tag) else {
            continue;
        };
        let value = reading.value;
        let mut push = |threshold: f64, bound: ViolationBound, severity: Severity| {
            violations.push(Violation {
                tag: reading.tag.clone(),
                value,
                threshold,
                bound,
                severity,
                severity_score: (value - threshold).abs(),
            });
        };

        if let Some(t) = rule.crit_min.filter(|t| value < *t) {
            push(t, ViolationBound::Min, Severity::Critical);
        } else if let Some(t) = rule.crit_max.filter(|t| value > *t) {
            push(t, ViolationBound::Max, Severity::Critical);
        } else if let Some(t) = rule.warn_min.filter(|t| value < *t) {
            push(t, ViolationBound::Min, Severity::Warning);
        } else if let Some(t) = rule.warn_max.filter(|t| value > *t) {
            push(t, ViolationBound::Max, Severity::Warning);
        } else if let Some(t) = rule.min.filter(|t| value < *t) {
            push(t, ViolationBound::Min, Severity::Minor);
        } else if let Some(t) = rule.max.filter(|t| value > *t) {
            push(t, ViolationBound::Max, Severity::Minor);
        }
    }
    violations
}

// =============================================================================
// TESTS
// =============================================================================
