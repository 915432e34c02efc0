//! VIGIL Query - Dynamic query translation
//!
//! Turns a natural-language question into a `TranslatedQuery` (time
//! window, aggregation resolution, referenced sensor set, rendered query
//! text), executes it against the store, and summarizes the rows.
//! Pattern tables are data; translation is total - unmatched input falls
//! back to a one-hour window at minute resolution.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use vigil_core::{
    AggregateFn, AggregateRow, Resolution, TimeUnit, TimeWindow, TranslatedQuery, VigilResult,
};
use vigil_store::TelemetryStore;

pub mod completeness;

pub use completeness::CompletenessAnalyzer;

// ============================================================================
// PATTERN TABLES
// ============================================================================

enum WindowSpec {
    /// Pattern captures a number; the unit is fixed.
    Numbered(TimeUnit),
    /// Pattern implies a fixed window ("yesterday", "this week").
    Fixed(TimeWindow),
}

struct TimePattern {
    regex: Regex,
    spec: WindowSpec,
    resolution: Resolution,
}

/// Ordered time-phrase table, Korean phrasings first, then English.
/// First match wins.
static TIME_PATTERNS: Lazy<Vec<TimePattern>> = Lazy::new(|| {
    use Resolution::*;
    use TimeUnit::*;

    let numbered = |pattern: &str, unit, resolution| TimePattern {
        regex: Regex::new(pattern).expect("static pattern"),
        spec: WindowSpec::Numbered(unit),
        resolution,
    };
    let fixed = |pattern: &str, amount, unit, resolution| TimePattern {
        regex: Regex::new(pattern).expect("static pattern"),
        spec: WindowSpec::Fixed(TimeWindow::new(amount, unit)),
        resolution,
    };

    vec![
        numbered(r"최근\s*(\d+)\s*분", Minutes, Latest),
        numbered(r"최근\s*(\d+)\s*시간", Hours, Minute),
        numbered(r"지난\s*(\d+)\s*시간", Hours, TenMinute),
        numbered(r"최근\s*(\d+)\s*일", Days, Hour),
        numbered(r"지난\s*(\d+)\s*일", Days, Hour),
        numbered(r"최근\s*(\d+)\s*주", Weeks, Hour),
        numbered(r"최근\s*(\d+)\s*개월", Months, Day),
        fixed(r"어제", 1, Days, TenMinute),
        fixed(r"오늘", 1, Days, Minute),
        fixed(r"이번\s*주", 1, Weeks, Hour),
        fixed(r"이번\s*달", 1, Months, Hour),
        numbered(r"(?i)last\s*(\d+)\s*minute", Minutes, Latest),
        numbered(r"(?i)last\s*(\d+)\s*hour", Hours, Minute),
        numbered(r"(?i)last\s*(\d+)\s*day", Days, TenMinute),
        numbered(r"(?i)last\s*(\d+)\s*week", Weeks, Hour),
        numbered(r"(?i)last\s*(\d+)\s*month", Months, Day),
    ]
});

static TAG_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"D\d{3}").expect("static pattern"));

const ALL_SENSOR_KEYWORDS: &[&str] = &["모든", "전체", "모두", "all"];

const AVG_KEYWORDS: &[&str] = &["평균", "average", "avg"];
const MAX_KEYWORDS: &[&str] = &["최대", "최고", "max"];
const MIN_KEYWORDS: &[&str] = &["최소", "최저", "min"];
const SUM_KEYWORDS: &[&str] = &["합계", "sum"];

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

// ============================================================================
// TRANSLATION
// ============================================================================

/// Translate a question given the currently active tag set.
///
/// Pure: same question and tag set always produce the same query.
pub fn translate(question: &str, active_tags: &[String]) -> TranslatedQuery {
    let lowered = question.to_lowercase();

    // Time window and resolution tier: first pattern match wins,
    // default one hour at minute resolution.
    let mut window = TimeWindow::new(1, TimeUnit::Hours);
    let mut resolution = Resolution::Minute;
    for pattern in TIME_PATTERNS.iter() {
        if let Some(captures) = pattern.regex.captures(question) {
            match &pattern.spec {
                WindowSpec::Numbered(unit) => {
                    if let Some(amount) = captures.get(1).and_then(|m| m.as_str().parse().ok()) {
                        window = TimeWindow::new(amount, *unit);
                        resolution = pattern.resolution;
                        break;
                    }
                }
                WindowSpec::Fixed(fixed) => {
                    window = *fixed;
                    resolution = pattern.resolution;
                    break;
                }
            }
        }
    }

    // Referenced sensors: identifier tokens present in the active set,
    // or every active tag when an "all sensors" keyword appears.
    let upper = question.to_uppercase();
    let mut tags: Vec<String> = Vec::new();
    for m in TAG_TOKEN.find_iter(&upper) {
        let tag = m.as_str();
        if !active_tags.is_empty() && !active_tags.iter().any(|t| t == tag) {
            continue;
        }
        // First-mention order, repeats dropped wherever they appear.
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    if contains_any(&lowered, ALL_SENSOR_KEYWORDS) {
        tags = active_tags.to_vec();
    }

    // Aggregates: each keyword adds one output column.
    let mut aggregates = Vec::new();
    if contains_any(&lowered, AVG_KEYWORDS) {
        aggregates.push(AggregateFn::Avg);
    }
    if contains_any(&lowered, MAX_KEYWORDS) {
        aggregates.push(AggregateFn::Max);
    }
    if contains_any(&lowered, MIN_KEYWORDS) {
        aggregates.push(AggregateFn::Min);
    }
    if contains_any(&lowered, SUM_KEYWORDS) {
        aggregates.push(AggregateFn::Sum);
    }

    let query_text = render_query(window, resolution, &tags, &aggregates);

    TranslatedQuery {
        window,
        resolution,
        tags,
        aggregates,
        query_text,
    }
}

/// Render the provenance query text for a translated question.
fn render_query(
    window: TimeWindow,
    resolution: Resolution,
    tags: &[String],
    aggregates: &[AggregateFn],
) -> String {
    let columns = if aggregates.is_empty() {
        if resolution == Resolution::Latest {
            "last(value), ts".to_string()
        } else {
            "avg(avg), min(min), max(max)".to_string()
        }
    } else {
        aggregates
            .iter()
            .map(|agg| match agg {
                AggregateFn::Avg => "avg(avg)",
                AggregateFn::Min => "min(min)",
                AggregateFn::Max => "max(max)",
                AggregateFn::Sum => "sum(sum)",
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    let tag_filter = if tags.is_empty() {
        String::new()
    } else {
        format!(" AND tag IN ({})", tags.join(", "))
    };

    format!(
        "SELECT tag, {columns} FROM {view} WHERE bucket >= now() - interval '{window}'{tag_filter} GROUP BY tag",
        view = resolution.view_name(),
        window = window.describe(),
    )
}

// ============================================================================
// TRANSLATOR
// ============================================================================

/// Result of answering one question against the store.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TranslatedAnswer {
    pub query: TranslatedQuery,
    pub rows: Vec<AggregateRow>,
    pub summary: String,
}

/// Translates questions and executes them against the injected store.
pub struct QueryTranslator {
    store: Arc<dyn TelemetryStore>,
}

impl QueryTranslator {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    /// Translate with a freshly discovered active tag set.
    pub async fn translate(&self, question: &str) -> VigilResult<TranslatedQuery> {
        let active_tags = self.store.active_tags().await?;
        Ok(translate(question, &active_tags))
    }

    /// Execute a translated query over the resolved time window.
    pub async fn execute(&self, query: &TranslatedQuery) -> VigilResult<Vec<AggregateRow>> {
        let end = Utc::now();
        let start = end - query.window.to_duration();
        self.store
            .windowed_aggregate(query.resolution, start, end, &query.tags, &query.aggregates)
            .await
    }

    /// Translate, execute, and summarize a question.
    ///
    /// A failed execution is absorbed: empty rows plus a "no matching
    /// data" summary, never an error to the caller.
    pub async fn answer(&self, question: &str) -> TranslatedAnswer {
        let query = match self.translate(question).await {
            Ok(query) => query,
            Err(err) => {
                tracing::warn!(%err, "active tag discovery failed, translating unrestricted");
                translate(question, &[])
            }
        };

        let rows = match self.execute(&query).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(%err, query = %query.query_text, "query execution failed");
                Vec::new()
            }
        };

        let summary = summarize(&query, &rows);
        TranslatedAnswer {
            query,
            rows,
            summary,
        }
    }
}

/// Human-readable per-tag summary of the result rows.
fn summarize(query: &TranslatedQuery, rows: &[AggregateRow]) -> String {
    if rows.is_empty() {
        return "No matching data for the requested range.".to_string();
    }
    let window = query.window.describe();

    if query.aggregates.contains(&AggregateFn::Avg) {
        let lines: Vec<String> = rows
            .iter()
            .filter_map(|row| row.avg.map(|avg| format!("{}: {:.2}", row.tag, avg)))
            .collect();
        return format!("Averages over the last {}:\n{}", window, lines.join("\n"));
    }

    let wants_minmax = query.aggregates.contains(&AggregateFn::Max)
        || query.aggregates.contains(&AggregateFn::Min);
    if wants_minmax {
        let lines: Vec<String> = rows
            .iter()
            .map(|row| {
                let mut parts = Vec::new();
                if let Some(max) = row.max {
                    parts.push(format!("max {:.2}", max));
                }
                if let Some(min) = row.min {
                    parts.push(format!("min {:.2}", min));
                }
                format!("{}: {}", row.tag, parts.join(", "))
            })
            .collect();
        return format!(
            "Extremes over the last {}:\n{}",
            window,
            lines.join("\n")
        );
    }

    format!("Retrieved {} sensors over the last {}.", rows.len(), window)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> Vec<String> {
        vec!["D100".to_string(), "D101".to_string(), "D102".to_string()]
    }

    #[test]
    fn test_default_translation_last_one_hour_minute_resolution() {
        // Korean phrasing.
        let q = translate("최근 1시간", &active());
        assert_eq!(q.window, TimeWindow::new(1, TimeUnit::Hours));
        assert_eq!(q.resolution, Resolution::Minute);
        assert!(q.is_unrestricted());

        // English equivalent.
        let q = translate("last 1 hour", &active());
        assert_eq!(q.window, TimeWindow::new(1, TimeUnit::Hours));
        assert_eq!(q.resolution, Resolution::Minute);
        assert!(q.is_unrestricted());
    }

    #[test]
    fn test_unmatched_question_uses_defaults() {
        let q = translate("how are things", &active());
        assert_eq!(q.window, TimeWindow::new(1, TimeUnit::Hours));
        assert_eq!(q.resolution, Resolution::Minute);
        assert!(q.tags.is_empty());
        assert!(q.aggregates.is_empty());
    }

    #[test]
    fn test_minute_phrases_pick_latest_view() {
        let q = translate("최근 30분 모든 센서", &active());
        assert_eq!(q.window, TimeWindow::new(30, TimeUnit::Minutes));
        assert_eq!(q.resolution, Resolution::Latest);
        assert_eq!(q.tags, active());
    }

    #[test]
    fn test_yesterday_fixed_window() {
        let q = translate("어제 데이터", &active());
        assert_eq!(q.window, TimeWindow::new(1, TimeUnit::Days));
        assert_eq!(q.resolution, Resolution::TenMinute);
    }

    #[test]
    fn test_english_day_window() {
        let q = translate("last 7 days for D100", &active());
        assert_eq!(q.window, TimeWindow::new(7, TimeUnit::Days));
        assert_eq!(q.resolution, Resolution::TenMinute);
        assert_eq!(q.tags, vec!["D100".to_string()]);
    }

    #[test]
    fn test_tag_extraction_restricted_to_active() {
        let q = translate("D100과 D999의 지난 24시간 최대값", &active());
        assert_eq!(q.tags, vec!["D100".to_string()]);
        assert_eq!(q.window, TimeWindow::new(24, TimeUnit::Hours));
        assert_eq!(q.resolution, Resolution::TenMinute);
        assert_eq!(q.aggregates, vec![AggregateFn::Max]);
    }

    #[test]
    fn test_repeated_tag_mentions_query_once() {
        // A tag named twice with another in between must not be queried
        // twice, and first-mention order is kept.
        let q = translate("D100과 D101 그리고 D100 비교", &active());
        assert_eq!(q.tags, vec!["D100".to_string(), "D101".to_string()]);
    }

    #[test]
    fn test_all_keyword_short_circuits_tags() {
        let q = translate("전체 태그의 평균", &active());
        assert_eq!(q.tags, active());
        assert_eq!(q.aggregates, vec![AggregateFn::Avg]);
    }

    #[test]
    fn test_multiple_aggregate_keywords() {
        let q = translate("average and min of D101 last 2 hours", &active());
        assert_eq!(q.aggregates, vec![AggregateFn::Avg, AggregateFn::Min]);
        assert_eq!(q.tags, vec!["D101".to_string()]);
    }

    #[test]
    fn test_query_text_contains_view_and_filter() {
        let q = translate("D100 최근 3일 평균", &active());
        assert!(q.query_text.contains("telemetry_agg_1h"));
        assert!(q.query_text.contains("D100"));
        assert!(q.query_text.contains("avg(avg)"));
        assert!(q.query_text.contains("3 days"));
    }

    #[test]
    fn test_summary_no_rows() {
        let q = translate("last 1 hour", &active());
        assert!(summarize(&q, &[]).contains("No matching data"));
    }

    #[test]
    fn test_summary_averages() {
        let q = translate("average last 1 hour", &active());
        let rows = vec![AggregateRow {
            tag: "D100".to_string(),
            avg: Some(45.25),
            data_points: 60,
            ..AggregateRow::default()
        }];
        let summary = summarize(&q, &rows);
        assert!(summary.contains("D100: 45.25"));
        assert!(summary.contains("1 hour"));
    }

    mod with_store {
        use super::*;
        use chrono::Duration;
        use vigil_core::SensorReading;
        use vigil_store::MemoryTelemetryStore;

        async fn translator() -> QueryTranslator {
            let store = MemoryTelemetryStore::new();
            let now = Utc::now();
            for i in 0..10 {
                store
                    .insert_reading(SensorReading::new(
                        "D100",
                        40.0 + i as f64,
                        now - Duration::minutes(10 - i),
                    ))
                    .await;
            }
            QueryTranslator::new(Arc::new(store))
        }

        #[tokio::test]
        async fn test_answer_end_to_end() {
            let translator = translator().await;
            let answer = translator.answer("D100 average last 1 hour").await;
            assert_eq!(answer.rows.len(), 1);
            assert_eq!(answer.rows[0].tag, "D100");
            assert!(answer.summary.contains("D100"));
        }

        #[tokio::test]
        async fn test_answer_no_data_is_absorbed() {
            let translator = translator().await;
            let answer = translator.answer("D101 last 5 minutes").await;
            assert!(answer.rows.is_empty());
            assert!(answer.summary.contains("No matching data"));
        }
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Translation is total: any input produces a query with a
        /// positive window.
        #[test]
        fn prop_translation_total(question in ".{0,80}") {
            let q = translate(&question, &[]);
            prop_assert!(q.window.amount > 0);
        }

        /// Translation is deterministic.
        #[test]
        fn prop_translation_deterministic(question in ".{0,80}") {
            let tags = vec!["D100".to_string(), "D200".to_string()];
            let a = translate(&question, &tags);
            let b = translate(&question, &tags);
            prop_assert_eq!(a, b);
        }

        /// Numbered hour phrases always resolve to the stated amount.
        #[test]
        fn prop_hour_phrase_amount(amount in 1i64..999) {
            let q = translate(&format!("last {} hours", amount), &[]);
            prop_assert_eq!(q.window, TimeWindow::new(amount, TimeUnit::Hours));
            prop_assert_eq!(q.resolution, Resolution::Minute);
        }
    }
}
