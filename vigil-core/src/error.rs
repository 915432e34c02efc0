//! Error types for VIGIL operations

use crate::PipelineStage;
use thiserror::Error;

/// Time-series store errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Query against {view} failed: {reason}")]
    QueryFailed { view: String, reason: String },

    #[error("Unknown sensor tag: {tag}")]
    UnknownTag { tag: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Natural-language translation errors.
///
/// Translation itself is total (unmatched input falls back to defaults);
/// these errors only cover rendering a query from an inconsistent
/// `TranslatedQuery`, which indicates a caller bug.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslateError {
    #[error("Empty question")]
    EmptyQuestion,

    #[error("Invalid time window: {amount} {unit}")]
    InvalidWindow { amount: i64, unit: String },
}

/// Hosted language-model errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    #[error("No completion provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Completion timed out after {elapsed_ms}ms")]
    TimedOut { elapsed_ms: i64 },
}

/// Response validation errors.
///
/// Note that a *failed check* is not an error: it is data inside
/// `ValidationResult`. These variants cover malformed inputs only.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidateError {
    #[error("Empty response text")]
    EmptyResponse,

    #[error("Fact context missing required field: {field}")]
    MissingContext { field: String },
}

/// Audit and reinforcement errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuditError {
    #[error("Unknown agent: {agent}")]
    UnknownAgent { agent: String },

    #[error("Learning history for {agent} is locked by a concurrent audit")]
    HistoryContended { agent: String },
}

/// Pipeline orchestration errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("Stage {stage:?} failed: {reason}")]
    StageFailed { stage: PipelineStage, reason: String },

    #[error("Pipeline aborted: {reason}")]
    Aborted { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all VIGIL errors.
#[derive(Debug, Clone, Error)]
pub enum VigilError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Translation error: {0}")]
    Translate(#[from] TranslateError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Validation error: {0}")]
    Validate(#[from] ValidateError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for VIGIL operations.
pub type VigilResult<T> = Result<T, VigilError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_query_failed() {
        let err = StoreError::QueryFailed {
            view: "agg_1m".to_string(),
            reason: "connection reset".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("agg_1m"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_llm_error_display_rate_limited() {
        let err = LlmError::RateLimited {
            provider: "openai".to_string(),
            retry_after_ms: 1500,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Rate limited"));
        assert!(msg.contains("openai"));
        assert!(msg.contains("1500"));
    }

    #[test]
    fn test_pipeline_error_display_stage_failed() {
        let err = PipelineError::StageFailed {
            stage: PipelineStage::Research,
            reason: "snapshot query failed".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Research"));
        assert!(msg.contains("snapshot query failed"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "audit.weights".to_string(),
            value: "1.2".to_string(),
            reason: "weights must sum to 1.0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("audit.weights"));
        assert!(msg.contains("sum to 1.0"));
    }

    #[test]
    fn test_vigil_error_from_variants() {
        let store = VigilError::from(StoreError::LockPoisoned);
        assert!(matches!(store, VigilError::Store(_)));

        let llm = VigilError::from(LlmError::ProviderNotConfigured);
        assert!(matches!(llm, VigilError::Llm(_)));

        let translate = VigilError::from(TranslateError::EmptyQuestion);
        assert!(matches!(translate, VigilError::Translate(_)));

        let validate = VigilError::from(ValidateError::EmptyResponse);
        assert!(matches!(validate, VigilError::Validate(_)));

        let audit = VigilError::from(AuditError::UnknownAgent {
            agent: "ResearchAgent".to_string(),
        });
        assert!(matches!(audit, VigilError::Audit(_)));

        let config = VigilError::from(ConfigError::MissingRequired {
            field: "llm.max_tokens".to_string(),
        });
        assert!(matches!(config, VigilError::Config(_)));
    }
}
