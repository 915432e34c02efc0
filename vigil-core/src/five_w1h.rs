//! The canonical six-field answer shape

use serde::{Deserialize, Serialize};

/// Placeholder for fields with nothing to report. Fields degrade to this
/// explicitly rather than being omitted, so the six-field shape is stable
/// for downstream rendering.
pub const NO_INFORMATION: &str = "No information available";

/// Who/What/Where/When/Why/How answer structure.
///
/// Extraction is deterministic: the same unmodified context always
/// produces an identical `FiveW1H`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiveW1H {
    pub who: String,
    pub what: String,
    pub where_: String,
    pub when: String,
    pub why: String,
    pub how: String,
    pub sources: Vec<String>,
}

impl FiveW1H {
    /// All six fields set to the explicit placeholder.
    pub fn empty() -> Self {
        Self {
            who: NO_INFORMATION.to_string(),
            what: NO_INFORMATION.to_string(),
            where_: NO_INFORMATION.to_string(),
            when: NO_INFORMATION.to_string(),
            why: NO_INFORMATION.to_string(),
            how: NO_INFORMATION.to_string(),
            sources: Vec::new(),
        }
    }

    /// Count of fields carrying real content.
    pub fn informative_fields(&self) -> usize {
        [
            &self.who,
            &self.what,
            &self.where_,
            &self.when,
            &self.why,
            &self.how,
        ]
        .iter()
        .filter(|f| f.as_str() != NO_INFORMATION)
        .count()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_has_no_informative_fields() {
        let r = FiveW1H::empty();
        assert_eq!(r.informative_fields(), 0);
    }

    #[test]
    fn test_informative_fields_counts_real_content() {
        let mut r = FiveW1H::empty();
        r.what = "D100 at 45.2 °C".to_string();
        r.when = "2026-08-25 10:00 UTC".to_string();
        assert_eq!(r.informative_fields(), 2);
    }
}
