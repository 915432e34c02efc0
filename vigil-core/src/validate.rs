//! Validation result types for the hallucination guard

use serde::{Deserialize, Serialize};

/// Coarse confidence band, used when reporting validation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Band boundaries: >=0.9 High, >=0.7 Medium, >=0.5 Low, else VeryLow.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            ConfidenceLevel::High
        } else if confidence >= 0.7 {
            ConfidenceLevel::Medium
        } else if confidence >= 0.5 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }
}

/// Outcome of validating one generated response against its fact context.
///
/// Transient: consumed immediately by the caller to decide pass-through
/// versus deterministic fallback. Callers should act on `confidence`
/// directly as well as `is_valid`; partial-credit cases get a disclaimer,
/// not rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Multiplicative confidence in [0,1], starting from 1.0.
    pub confidence: f64,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    /// Names of the checks that actually ran.
    pub checks_performed: Vec<String>,
}

impl ValidationResult {
    /// A passing result before any check has deducted confidence.
    pub fn passing() -> Self {
        Self {
            is_valid: true,
            confidence: 1.0,
            issues: Vec::new(),
            suggestions: Vec::new(),
            checks_performed: Vec::new(),
        }
    }

    /// Record an issue and scale confidence by the check's multiplier.
    pub fn flag(&mut self, issue: impl Into<String>, multiplier: f64) {
        self.issues.push(issue.into());
        self.confidence *= multiplier;
        self.is_valid = false;
    }

    /// Scale confidence without raising an issue (soft deduction).
    pub fn deduct(&mut self, multiplier: f64) {
        self.confidence *= multiplier;
    }

    pub fn suggest(&mut self, suggestion: impl Into<String>) {
        self.suggestions.push(suggestion.into());
    }

    pub fn mark_check(&mut self, name: &str) {
        self.checks_performed.push(name.to_string());
    }

    pub fn level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_confidence(self.confidence)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_level_bands() {
        assert_eq!(ConfidenceLevel::from_confidence(0.95), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_confidence(0.9), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_confidence(0.7), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(0.5), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_confidence(0.49), ConfidenceLevel::VeryLow);
    }

    #[test]
    fn test_passing_result() {
        let r = ValidationResult::passing();
        assert!(r.is_valid);
        assert_eq!(r.confidence, 1.0);
        assert!(r.issues.is_empty());
    }

    #[test]
    fn test_flag_invalidates_and_scales() {
        let mut r = ValidationResult::passing();
        r.flag("unit mismatch for D100", 0.5);
        assert!(!r.is_valid);
        assert_eq!(r.confidence, 0.5);
        assert_eq!(r.issues.len(), 1);
    }

    #[test]
    fn test_deduct_keeps_valid() {
        let mut r = ValidationResult::passing();
        r.deduct(0.95);
        assert!(r.is_valid);
        assert!((r.confidence - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_multiplicative_stacking() {
        let mut r = ValidationResult::passing();
        r.flag("a", 0.8);
        r.flag("b", 0.5);
        assert!((r.confidence - 0.4).abs() < 1e-12);
        assert_eq!(r.level(), ConfidenceLevel::VeryLow);
    }
}
