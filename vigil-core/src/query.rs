//! Translated query types
//!
//! A `TranslatedQuery` is immutable once constructed and regenerated for
//! every question; it is never cached across questions.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Unit of a requested time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
}

/// Requested time window, e.g. "last 6 hours".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub amount: i64,
    pub unit: TimeUnit,
}

impl TimeWindow {
    pub fn new(amount: i64, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    /// Convert to a concrete duration. Months use the 30-day convention
    /// the pre-aggregated views are bucketed with.
    pub fn to_duration(&self) -> Duration {
        match self.unit {
            TimeUnit::Minutes => Duration::minutes(self.amount),
            TimeUnit::Hours => Duration::hours(self.amount),
            TimeUnit::Days => Duration::days(self.amount),
            TimeUnit::Weeks => Duration::weeks(self.amount),
            TimeUnit::Months => Duration::days(self.amount * 30),
        }
    }

    /// Human-readable form used in summaries, e.g. "6 hours".
    pub fn describe(&self) -> String {
        let unit = match self.unit {
            TimeUnit::Minutes => "minute",
            TimeUnit::Hours => "hour",
            TimeUnit::Days => "day",
            TimeUnit::Weeks => "week",
            TimeUnit::Months => "month",
        };
        if self.amount == 1 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", self.amount, unit)
        }
    }
}

/// The fixed ladder of pre-aggregated view resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// Near-real-time latest-value view
    Latest,
    /// One-minute buckets
    Minute,
    /// Ten-minute buckets
    TenMinute,
    /// Hourly buckets
    Hour,
    /// Daily buckets
    Day,
}

impl Resolution {
    /// Name of the backing view for this resolution tier.
    pub fn view_name(&self) -> &'static str {
        match self {
            Resolution::Latest => "telemetry_latest",
            Resolution::Minute => "telemetry_agg_1m",
            Resolution::TenMinute => "telemetry_agg_10m",
            Resolution::Hour => "telemetry_agg_1h",
            Resolution::Day => "telemetry_agg_1d",
        }
    }
}

/// Aggregate functions selectable by question keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFn {
    Avg,
    Min,
    Max,
    Sum,
}

/// The outcome of translating one natural-language question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedQuery {
    pub window: TimeWindow,
    pub resolution: Resolution,
    /// Referenced sensor tags; empty means unrestricted.
    pub tags: Vec<String>,
    /// Requested aggregates; empty means last-value / default columns.
    pub aggregates: Vec<AggregateFn>,
    /// Rendered query text, for logging and provenance reporting.
    pub query_text: String,
}

impl TranslatedQuery {
    /// True when the question did not restrict the sensor set.
    pub fn is_unrestricted(&self) -> bool {
        self.tags.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
