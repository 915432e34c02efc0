//! VIGIL Validate - Hallucination guard
//!
//! Checks a generated response against the facts the pipeline actually
//! collected: quoted numbers, sensor tags, physical plausibility, tense,
//! internal consistency, and tone. Confidence is multiplicative; every
//! failed check scales it down, and low confidence earns a disclaimer
//! rather than outright rejection.

use once_cell::sync::Lazy;
use regex::Regex;
use vigil_core::{
    CollectedPayload, QueryContext, QueryIntent, SensorKind, ValidationResult, ValidatorPolicy,
};

pub mod fallback;

pub use fallback::fallback_response;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+\.?\d*").expect("static pattern"));
static TAG_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"D\d{3}").expect("static pattern"));
static DATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("static pattern"));
static TIME_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,2}:\d{2}").expect("static pattern"));
static PH_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)pH\s*:?\s*(-?\d+\.?\d*)").expect("static pattern"));
static CELSIUS_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+\.?\d*)\s*°C").expect("static pattern"));
static BAR_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+\.?\d*)\s*bar").expect("static pattern"));

const FUTURE_PHRASES: &[&str] = &["내일", "다음 주", "will be", "going to", "예정"];
const CERTAINTY_PHRASES: &[&str] = &["반드시", "절대적으로", "100%", "확실히"];
const HEDGE_PHRASES: &[&str] = &["추정", "예상", "약", "대략"];
const CONTRADICTION_SUBJECTS: &[&str] = &["센서", "압력", "온도", "유량"];

/// Characters either side of a subject word searched for contradictory
/// claims about it.
const CONTRADICTION_WINDOW: usize = 30;

// ============================================================================
// FACT CONTEXT
// ============================================================================

/// Ground truth a response is validated against.
#[derive(Debug, Clone, Default)]
pub struct FactContext {
    /// Numbers the pipeline actually collected or computed.
    pub known_numbers: Vec<f64>,
    /// Numbers quoted by retrieved knowledge entries.
    pub knowledge_numbers: Vec<f64>,
    /// Tags that exist in the store.
    pub known_tags: Vec<String>,
    /// Whether the question asks about the past (future tense is then a
    /// defect, not a forecast).
    pub historical: bool,
}

impl FactContext {
    /// Gather every number and tag the pipeline collected for a question.
    pub fn from_context(ctx: &QueryContext, known_tags: Vec<String>) -> Self {
        let mut numbers = Vec::new();
        for payload in &ctx.collected {
            match payload {
                CollectedPayload::CurrentStatus { readings, rules, .. } => {
                    numbers.extend(readings.iter().map(|r| r.value));
                    for rule in rules {
                        numbers.extend(rule.lower_bound());
                        numbers.extend(rule.upper_bound());
                    }
                }
                CollectedPayload::Historical { summary, .. } => {
                    for stats in summary {
                        numbers.extend([stats.min, stats.max, stats.avg]);
                    }
                }
                CollectedPayload::Comparison { rows, current, .. } => {
                    for row in rows {
                        numbers.extend([
                            row.yesterday_avg,
                            row.today_avg,
                            row.change,
                            row.pct_change,
                        ]);
                    }
                    numbers.extend(current.iter().map(|r| r.value));
                }
                CollectedPayload::Correlation { stats, samples, .. } => {
                    for s in stats {
                        numbers.extend([s.min, s.max, s.avg]);
                    }
                    numbers.extend(samples.iter().map(|r| r.value));
                }
                CollectedPayload::Violations {
                    violations,
                    violation_rate,
                    current,
                    ..
                } => {
                    for v in violations {
                        numbers.extend([v.value, v.threshold]);
                    }
                    numbers.push(*violation_rate);
                    numbers.extend(current.iter().map(|r| r.value));
                }
                CollectedPayload::Overview {
                    current, statistics, ..
                } => {
                    numbers.extend(current.iter().map(|r| r.value));
                    numbers.push(statistics.total_sensors as f64);
                    numbers.push(statistics.total_records as f64);
                }
                CollectedPayload::Aggregates { rows, .. } => {
                    for row in rows {
                        for v in [row.avg, row.min, row.max, row.sum, row.last] {
                            numbers.extend(v);
                        }
                        numbers.push(row.data_points as f64);
                    }
                }
            }
        }

        Self {
            known_numbers: numbers,
            knowledge_numbers: Vec::new(),
            known_tags,
            historical: matches!(
                ctx.intent,
                Some(QueryIntent::HistoricalTrend) | Some(QueryIntent::Comparison)
            ),
        }
    }

    /// Add numbers quoted by retrieved knowledge texts.
    pub fn with_knowledge_texts<S: AsRef<str>>(mut self, texts: &[S]) -> Self {
        for text in texts {
            self.knowledge_numbers.extend(extract_numbers(text.as_ref()));
        }
        self
    }

    fn all_numbers(&self) -> impl Iterator<Item = f64> + '_ {
        self.known_numbers
            .iter()
            .chain(self.knowledge_numbers.iter())
            .copied()
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

/// Validates one generated response against its fact context.
pub struct ResponseValidator {
    policy: ValidatorPolicy,
}

impl ResponseValidator {
    pub fn new(policy: ValidatorPolicy) -> Self {
        Self { policy }
    }

    /// Run every check; the result accumulates issues and a
    /// multiplicative confidence.
    pub fn validate(&self, response: &str, facts: &FactContext) -> ValidationResult {
        let mut result = ValidationResult::passing();

        self.check_numbers(response, facts, &mut result);
        self.check_physical_plausibility(response, &mut result);
        self.check_tags(response, facts, &mut result);
        self.check_tense(response, facts, &mut result);
        self.check_contradictions(response, &mut result);
        self.check_overconfidence(response, &mut result);

        if !result.is_valid {
            tracing::debug!(
                confidence = result.confidence,
                issues = result.issues.len(),
                "response failed validation checks"
            );
        }
        result
    }

    /// Append a disclaimer when confidence fell below the policy
    /// thresholds; the response text itself is never rewritten.
    pub fn apply_disclaimer(&self, response: &str, result: &ValidationResult) -> String {
        if result.confidence < self.policy.strong_disclaimer_threshold {
            format!(
                "{response}\n\n⚠️ This answer failed several consistency checks against the collected data. Treat it as unverified and consult the raw sensor readings."
            )
        } else if result.confidence < self.policy.disclaimer_threshold {
            format!(
                "{response}\n\nNote: parts of this answer could not be verified against the collected data."
            )
        } else {
            response.to_string()
        }
    }

    /// Quoted numbers must trace back to collected data or retrieved
    /// knowledge. Strong divergence from knowledge is an issue; merely
    /// unmatched numbers deduct by magnitude.
    fn check_numbers(&self, response: &str, facts: &FactContext, result: &mut ValidationResult) {
        result.mark_check("numeric grounding");
        let fact_numbers: Vec<f64> = facts.all_numbers().collect();

        // Digits inside tag tokens, dates, and clock times are
        // identifiers, not quantities.
        let scrubbed = TAG_TOKEN.replace_all(response, " ");
        let scrubbed = DATE_TOKEN.replace_all(&scrubbed, " ");
        let scrubbed = TIME_TOKEN.replace_all(&scrubbed, " ");
        for number in extract_numbers(&scrubbed) {
            if fact_numbers.is_empty() {
                self.penalize_unmatched(number, result);
                continue;
            }
            let closest_rel = fact_numbers
                .iter()
                .map(|f| relative_difference(number, *f))
                .fold(f64::INFINITY, f64::min);

            if closest_rel <= 0.01 {
                continue;
            }
            if number.abs() > self.policy.large_number_cutoff {
                result.flag(
                    format!("quoted value {number} has no source in the collected data"),
                    self.policy.large_unmatched_multiplier,
                );
            } else if closest_rel > self.policy.mismatch_ratio {
                result.flag(
                    format!(
                        "quoted value {number} diverges from every collected or known value"
                    ),
                    self.policy.knowledge_mismatch_multiplier,
                );
                result.suggest("quote values directly from the collected readings".to_string());
            } else if number.abs() >= self.policy.mid_number_cutoff {
                result.deduct(self.policy.mid_unmatched_multiplier);
            }
        }
    }

    fn penalize_unmatched(&self, number: f64, result: &mut ValidationResult) {
        let magnitude = number.abs();
        if magnitude > self.policy.large_number_cutoff {
            result.flag(
                format!("quoted value {number} has no source in the collected data"),
                self.policy.large_unmatched_multiplier,
            );
        } else if magnitude >= self.policy.mid_number_cutoff {
            result.deduct(self.policy.mid_unmatched_multiplier);
        }
    }

    /// Quantities must be physically possible: temperature above absolute
    /// zero, pressure non-negative, pH on the 0-14 scale.
    fn check_physical_plausibility(&self, response: &str, result: &mut ValidationResult) {
        result.mark_check("physical plausibility");
        let out_of_range = |value: f64, range: (f64, f64)| value < range.0 || value > range.1;

        for cap in PH_VALUE.captures_iter(response) {
            if let Some(value) = cap.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                if out_of_range(value, (0.0, 14.0)) {
                    result.flag(
                        format!("pH {value} is outside the 0-14 scale"),
                        self.policy.implausible_value_multiplier,
                    );
                }
            }
        }
        for cap in CELSIUS_VALUE.captures_iter(response) {
            if let Some(value) = cap.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                if out_of_range(value, (-273.15, 1000.0)) {
                    result.flag(
                        format!("{value} °C is not a physically plausible temperature"),
                        self.policy.implausible_value_multiplier,
                    );
                }
            }
        }
        for cap in BAR_VALUE.captures_iter(response) {
            if let Some(value) = cap.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                if out_of_range(value, (0.0, 100.0)) {
                    result.flag(
                        format!("{value} bar is not a plausible process pressure"),
                        self.policy.implausible_value_multiplier,
                    );
                }
            }
        }
    }

    /// Mentioned tags must exist, and a tag's quantity words must agree
    /// with its physical kind.
    fn check_tags(&self, response: &str, facts: &FactContext, result: &mut ValidationResult) {
        result.mark_check("tag existence");
        result.mark_check("unit agreement");

        for m in TAG_TOKEN.find_iter(response) {
            let tag = m.as_str();
            if !facts.known_tags.is_empty() && !facts.known_tags.iter().any(|t| t == tag) {
                result.flag(
                    format!("sensor {tag} does not exist in the store"),
                    self.policy.unknown_tag_multiplier,
                );
                continue;
            }
            if let Some(kind) = SensorKind::for_tag(tag) {
                let tail: String = response[m.end()..].chars().take(40).collect();
                let foreign_unit = [
                    SensorKind::Temperature,
                    SensorKind::Pressure,
                    SensorKind::Flow,
                    SensorKind::Vibration,
                ]
                .iter()
                .filter(|k| **k != kind)
                .any(|k| tail.contains(k.unit()));
                if foreign_unit && !tail.contains(kind.unit()) {
                    result.flag(
                        format!("{tag} is a {} sensor but is quoted in another unit", kind.name()),
                        self.policy.unit_mismatch_multiplier,
                    );
                }
            }
        }
    }

    /// A historical question must not be answered in the future tense.
    fn check_tense(&self, response: &str, facts: &FactContext, result: &mut ValidationResult) {
        if !facts.historical {
            return;
        }
        result.mark_check("tense agreement");
        if FUTURE_PHRASES.iter().any(|p| response.contains(p)) {
            result.flag(
                "future-tense phrasing in an answer about past data".to_string(),
                self.policy.future_tense_multiplier,
            );
        }
    }

    /// Contradictory claims about the same subject within one sentence.
    /// Opposites in different sentences may describe different moments
    /// and are not flagged.
    fn check_contradictions(&self, response: &str, result: &mut ValidationResult) {
        result.mark_check("internal consistency");
        for sentence in response.split(['.', '!', '?', '\n', '。']) {
            if sentence_contradicts(sentence) {
                result.flag(
                    "contradictory claims about the same subject in one sentence".to_string(),
                    self.policy.contradiction_multiplier,
                );
                return;
            }
        }
    }

    /// Heavy certainty language with zero hedging reads as fabricated
    /// confidence.
    fn check_overconfidence(&self, response: &str, result: &mut ValidationResult) {
        result.mark_check("tone calibration");
        let certainty: usize = CERTAINTY_PHRASES
            .iter()
            .map(|p| response.matches(p).count())
            .sum();
        let hedges: usize = HEDGE_PHRASES
            .iter()
            .map(|p| response.matches(p).count())
            .sum();
        if certainty >= self.policy.certainty_phrase_limit && hedges == 0 {
            result.flag(
                "absolute certainty language without any hedging".to_string(),
                self.policy.overconfidence_multiplier,
            );
        }
    }
}

/// Both members of an opposite pair near the same subject word.
fn sentence_contradicts(sentence: &str) -> bool {
    let chars: Vec<char> = sentence.chars().collect();
    for subject in CONTRADICTION_SUBJECTS {
        let subject_chars: Vec<char> = subject.chars().collect();
        let mut offset = 0;
        while let Some(pos) = find_chars(&chars[offset..], &subject_chars) {
            let at = offset + pos;
            let lo = at.saturating_sub(CONTRADICTION_WINDOW);
            let hi = (at + subject_chars.len() + CONTRADICTION_WINDOW).min(chars.len());
            let window: String = chars[lo..hi].iter().collect();
            if window.contains("증가") && window.contains("감소") {
                return true;
            }
            if window.contains("비정상") && count_plain_normal(&window) > 0 {
                return true;
            }
            offset = at + subject_chars.len();
        }
    }
    false
}

/// Occurrences of 정상 that are not the tail of 비정상.
fn count_plain_normal(text: &str) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let needle: Vec<char> = "정상".chars().collect();
    let mut count = 0;
    let mut i = 0;
    while let Some(pos) = find_chars(&chars[i..], &needle) {
        let at = i + pos;
        if at == 0 || chars[at - 1] != '비' {
            count += 1;
        }
        i = at + 1;
    }
    count
}

fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

fn extract_numbers(text: &str) -> Vec<f64> {
    NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

fn relative_difference(a: f64, b: f64) -> f64 {
    (a - b).abs() / b.abs().max(1.0)
}

// =============================================================================
// TESTS
// =============================================================================
