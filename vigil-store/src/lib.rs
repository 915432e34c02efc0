//! VIGIL Store - External data seams
//!
//! Async trait boundaries for the time-series store and the semantic
//! knowledge index, plus in-memory implementations used by tests and the
//! demo binary. The production backends live behind these traits and are
//! out of scope here.

use ::async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use vigil_core::{
    AggregateFn, AggregateRow, QcRule, Resolution, SensorReading, StoreStatistics, Timestamp,
    VigilResult,
};

// ============================================================================
// TIME-SERIES STORE TRAIT
// ============================================================================

/// Async seam over the time-series store.
///
/// All methods are suspension points; implementations must never block
/// the executor. Failures surface as `StoreError` and are absorbed by the
/// calling stage, not propagated to the user.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Point-in-time snapshot: the latest reading per sensor, optionally
    /// restricted to a tag set.
    async fn latest_snapshot(&self, tags: Option<&[String]>)
        -> VigilResult<Vec<SensorReading>>;

    /// QC rule definitions, optionally restricted to a tag set.
    async fn qc_rules(&self, tags: Option<&[String]>) -> VigilResult<Vec<QcRule>>;

    /// Windowed aggregate query against one pre-aggregated view.
    ///
    /// An empty `tags` slice means unrestricted. An empty `aggregates`
    /// slice requests the tier's default columns (last value at the
    /// finest resolution, avg/min/max at coarser tiers).
    async fn windowed_aggregate(
        &self,
        resolution: Resolution,
        start: Timestamp,
        end: Timestamp,
        tags: &[String],
        aggregates: &[AggregateFn],
    ) -> VigilResult<Vec<AggregateRow>>;

    /// Raw per-sample history for one tag, used by the completeness
    /// analyzer and for correlation sample points.
    async fn raw_history(
        &self,
        tag: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> VigilResult<Vec<SensorReading>>;

    /// Tags with data in the trailing 24 hours.
    async fn active_tags(&self) -> VigilResult<Vec<String>>;

    /// Store-wide statistics for system-overview questions.
    async fn statistics(&self) -> VigilResult<StoreStatistics>;
}

// ============================================================================
// KNOWLEDGE INDEX TRAIT
// ============================================================================

/// One ranked entry returned by the semantic knowledge index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub content: String,
    pub category: String,
    pub similarity: f64,
}

/// Async seam over the semantic knowledge index.
///
/// Entries below the index's minimum similarity threshold are excluded by
/// the index itself, never by the caller.
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    async fn search(&self, text: &str, top_k: usize) -> VigilResult<Vec<KnowledgeEntry>>;
}

// ============================================================================
// IN-MEMORY TELEMETRY STORE
// ============================================================================

/// In-memory telemetry store over std collections, for tests and demos.
pub struct MemoryTelemetryStore {
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    /// Per-tag history, kept sorted by timestamp.
    history: BTreeMap<String, Vec<SensorReading>>,
    rules: Vec<QcRule>,
}

impl MemoryTelemetryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Insert a reading, keeping the tag's history time-ordered.
    pub async fn insert_reading(&self, reading: SensorReading) {
        let mut inner = self.inner.write().await;
        let history = inner.history.entry(reading.tag.clone()).or_default();
        let pos = history.partition_point(|r| r.ts <= reading.ts);
        history.insert(pos, reading);
    }

    pub async fn insert_rule(&self, rule: QcRule) {
        self.inner.write().await.rules.push(rule);
    }

    fn tag_selected(tags: Option<&[String]>, tag: &str) -> bool {
        match tags {
            Some(set) if !set.is_empty() => set.iter().any(|t| t == tag),
            _ => true,
        }
    }
}

impl Default for MemoryTelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetryStore for MemoryTelemetryStore {
    async fn latest_snapshot(
        &self,
        tags: Option<&[String]>,
    ) -> VigilResult<Vec<SensorReading>> {
        let inner = self.inner.read().await;
        Ok(inner
            .history
            .iter()
            .filter(|(tag, _)| Self::tag_selected(tags, tag))
            .filter_map(|(_, readings)| readings.last().cloned())
            .collect())
    }

    async fn qc_rules(&self, tags: Option<&[String]>) -> VigilResult<Vec<QcRule>> {
        let inner = self.inner.read().await;
        Ok(inner
            .rules
            .iter()
            .filter(|rule| Self::tag_selected(tags, &rule.tag))
            .cloned()
            .collect())
    }

    async fn windowed_aggregate(
        &self,
        resolution: Resolution,
        start: Timestamp,
        end: Timestamp,
        tags: &[String],
        aggregates: &[AggregateFn],
    ) -> VigilResult<Vec<AggregateRow>> {
        let inner = self.inner.read().await;
        let selected = if tags.is_empty() { None } else { Some(tags) };

        let mut rows = Vec::new();
        for (tag, readings) in &inner.history {
            if !Self::tag_selected(selected, tag) {
                continue;
            }
            let in_window: Vec<&SensorReading> = readings
                .iter()
                .filter(|r| r.ts >= start && r.ts <= end)
                .collect();
            if in_window.is_empty() {
                continue;
            }

            let values: Vec<f64> = in_window.iter().map(|r| r.value).collect();
            let count = values.len() as i64;
            let sum: f64 = values.iter().sum();
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let avg = sum / count as f64;

            let mut row = AggregateRow {
                tag: tag.clone(),
                data_points: count,
                earliest_bucket: in_window.first().map(|r| r.ts),
                latest_bucket: in_window.last().map(|r| r.ts),
                ..AggregateRow::default()
            };

            if aggregates.is_empty() {
                // Default columns per resolution tier.
                if resolution == Resolution::Latest {
                    row.last = in_window.last().map(|r| r.value);
                } else {
                    row.avg = Some(avg);
                    row.min = Some(min);
                    row.max = Some(max);
                }
            } else {
                for agg in aggregates {
                    match agg {
                        AggregateFn::Avg => row.avg = Some(avg),
                        AggregateFn::Min => row.min = Some(min),
                        AggregateFn::Max => row.max = Some(max),
                        AggregateFn::Sum => row.sum = Some(sum),
                    }
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }

    async fn raw_history(
        &self,
        tag: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> VigilResult<Vec<SensorReading>> {
        let inner = self.inner.read().await;
        Ok(inner
            .history
            .get(tag)
            .map(|readings| {
                readings
                    .iter()
                    .filter(|r| r.ts >= start && r.ts <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn active_tags(&self) -> VigilResult<Vec<String>> {
        let cutoff = Utc::now() - Duration::hours(24);
        let inner = self.inner.read().await;
        Ok(inner
            .history
            .iter()
            .filter(|(_, readings)| readings.last().is_some_and(|r| r.ts >= cutoff))
            .map(|(tag, _)| tag.clone())
            .collect())
    }

    async fn statistics(&self) -> VigilResult<StoreStatistics> {
        let inner = self.inner.read().await;
        let total_records: i64 = inner.history.values().map(|v| v.len() as i64).sum();
        let oldest = inner
            .history
            .values()
            .filter_map(|v| v.first().map(|r| r.ts))
            .min();
        let latest = inner
            .history
            .values()
            .filter_map(|v| v.last().map(|r| r.ts))
            .max();
        Ok(StoreStatistics {
            total_sensors: inner.history.len() as i64,
            total_records,
            oldest_record: oldest,
            latest_record: latest,
        })
    }
}

// ============================================================================
// IN-MEMORY KNOWLEDGE INDEX
// ============================================================================

/// In-memory knowledge index with word-overlap similarity, for tests.
pub struct MemoryKnowledgeIndex {
    entries: Vec<(String, String)>,
    /// Entries below this similarity are excluded by the index.
    min_similarity: f64,
}

impl MemoryKnowledgeIndex {
    pub fn new(min_similarity: f64) -> Self {
        Self {
            entries: Vec::new(),
            min_similarity,
        }
    }

    pub fn add_entry(&mut self, content: impl Into<String>, category: impl Into<String>) {
        self.entries.push((content.into(), category.into()));
    }

    /// Jaccard similarity over whitespace-split words.
    fn similarity(a: &str, b: &str) -> f64 {
        let words_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
        let words_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
        let union = words_a.union(&words_b).count();
        if union == 0 {
            return 0.0;
        }
        words_a.intersection(&words_b).count() as f64 / union as f64
    }
}

#[async_trait]
impl KnowledgeIndex for MemoryKnowledgeIndex {
    async fn search(&self, text: &str, top_k: usize) -> VigilResult<Vec<KnowledgeEntry>> {
        let mut scored: Vec<KnowledgeEntry> = self
            .entries
            .iter()
            .map(|(content, category)| KnowledgeEntry {
                similarity: Self::similarity(text, content),
                content: content.clone(),
                category: category.clone(),
            })
            .filter(|e| e.similarity >= self.min_similarity)
            .collect();
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store() -> MemoryTelemetryStore {
        let store = MemoryTelemetryStore::new();
        let now = Utc::now();
        for (tag, values) in [("D100", [40.0, 42.0, 45.0]), ("D101", [2.0, 2.2, 2.1])] {
            for (i, v) in values.iter().enumerate() {
                store
                    .insert_reading(SensorReading::new(
                        tag,
                        *v,
                        now - Duration::minutes((values.len() - i) as i64),
                    ))
                    .await;
            }
        }
        store
            .insert_rule(QcRule::banded("D100", (10.0, 80.0), (0.0, 95.0)))
            .await;
        store
    }

    #[tokio::test]
    async fn test_latest_snapshot_returns_last_per_tag() {
        let store = seeded_store().await;
        let snapshot = store.latest_snapshot(None).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        let d100 = snapshot.iter().find(|r| r.tag == "D100").unwrap();
        assert_eq!(d100.value, 45.0);
    }

    #[tokio::test]
    async fn test_latest_snapshot_filters_tags() {
        let store = seeded_store().await;
        let tags = vec!["D101".to_string()];
        let snapshot = store.latest_snapshot(Some(&tags)).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].tag, "D101");
    }

    #[tokio::test]
    async fn test_qc_rules_filtered() {
        let store = seeded_store().await;
        let rules = store.qc_rules(None).await.unwrap();
        assert_eq!(rules.len(), 1);
        let tags = vec!["D101".to_string()];
        assert!(store.qc_rules(Some(&tags)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_windowed_aggregate_default_columns() {
        let store = seeded_store().await;
        let now = Utc::now();
        let rows = store
            .windowed_aggregate(
                Resolution::Minute,
                now - Duration::hours(1),
                now,
                &["D100".to_string()],
                &[],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.data_points, 3);
        assert_eq!(row.min, Some(40.0));
        assert_eq!(row.max, Some(45.0));
        assert!(row.last.is_none());
    }

    #[tokio::test]
    async fn test_windowed_aggregate_latest_tier_uses_last() {
        let store = seeded_store().await;
        let now = Utc::now();
        let rows = store
            .windowed_aggregate(
                Resolution::Latest,
                now - Duration::hours(1),
                now,
                &["D100".to_string()],
                &[],
            )
            .await
            .unwrap();
        assert_eq!(rows[0].last, Some(45.0));
        assert!(rows[0].avg.is_none());
    }

    #[tokio::test]
    async fn test_windowed_aggregate_requested_columns() {
        let store = seeded_store().await;
        let now = Utc::now();
        let rows = store
            .windowed_aggregate(
                Resolution::Hour,
                now - Duration::hours(1),
                now,
                &[],
                &[AggregateFn::Sum],
            )
            .await
            .unwrap();
        let d100 = rows.iter().find(|r| r.tag == "D100").unwrap();
        assert_eq!(d100.sum, Some(127.0));
        assert!(d100.avg.is_none());
    }

    #[tokio::test]
    async fn test_raw_history_window() {
        let store = seeded_store().await;
        let now = Utc::now();
        // Start half a minute early: seeding captured its own `now`, so
        // the reading at exactly -2min sits microseconds before this one.
        let history = store
            .raw_history("D100", now - Duration::seconds(150), now)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_active_tags_and_statistics() {
        let store = seeded_store().await;
        let tags = store.active_tags().await.unwrap();
        assert_eq!(tags, vec!["D100".to_string(), "D101".to_string()]);

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_sensors, 2);
        assert_eq!(stats.total_records, 6);
        assert!(stats.latest_record.is_some());
    }

    #[tokio::test]
    async fn test_knowledge_index_threshold_and_ranking() {
        let mut index = MemoryKnowledgeIndex::new(0.2);
        index.add_entry("D100 temperature sensor normal range", "sensor");
        index.add_entry("pressure pump maintenance schedule", "maintenance");

        let results = index
            .search("D100 temperature sensor current status", 5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].category, "sensor");
        assert!(results[0].similarity >= 0.2);
    }

    #[tokio::test]
    async fn test_knowledge_index_top_k() {
        let mut index = MemoryKnowledgeIndex::new(0.0);
        index.add_entry("a b c", "x");
        index.add_entry("a b", "y");
        index.add_entry("a", "z");

        let results = index.search("a b c", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].similarity >= results[1].similarity);
    }
}
