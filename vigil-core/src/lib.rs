//! VIGIL Core - Data Types
//!
//! Pure data structures with no external-call behavior. All other crates
//! depend on this. This crate contains ONLY data types, their invariants,
//! and the error taxonomy - no orchestration logic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

mod audit;
mod config;
mod context;
mod error;
mod five_w1h;
mod gap;
mod query;
mod telemetry;
mod validate;

pub use audit::{AuditResult, GradeBand, LearningHistory, RECENT_SCORE_WINDOW};
pub use config::{AuditPolicy, CompletenessPolicy, LlmPolicy, PolicyConfig, ValidatorPolicy};
pub use context::{
    AnomalySummary, CheckOutcome, CollectedPayload, ComparisonRow, CorrelationPattern,
    Distribution, Insights, PipelineStage, QualityReport, QueryContext, QueryIntent, Severity,
    StageNote, TagStats, Violation, ViolationBound,
};
pub use error::{
    AuditError, ConfigError, LlmError, PipelineError, StoreError, TranslateError, ValidateError,
    VigilError, VigilResult,
};
pub use five_w1h::{FiveW1H, NO_INFORMATION};
pub use gap::{CompletenessGrade, GapAnalysis, GapPeriod};
pub use query::{AggregateFn, Resolution, TimeUnit, TimeWindow, TranslatedQuery};
pub use telemetry::{
    AggregateRow, QcRule, SensorKind, SensorReading, SensorStatus, StoreStatistics,
};
pub use validate::{ConfidenceLevel, ValidationResult};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Invocation identifier using UUIDv7 for timestamp-sortable IDs.
pub type InvocationId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 invocation id (timestamp-sortable).
pub fn new_invocation_id() -> InvocationId {
    Uuid::now_v7()
}

// =============================================================================
// TESTS
// =============================================================================
