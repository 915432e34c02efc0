//! VIGIL Format - Who/What/Where/When/Why/How composition
//!
//! Extracts the six-field answer shape from a completed pipeline context
//! and renders it as text. Extraction is a pure function of the context:
//! no wall-clock reads, no randomness, so composing the same context
//! twice yields byte-identical output. Fields with nothing to report
//! degrade to the explicit placeholder rather than being dropped.

use vigil_core::{
    CollectedPayload, FiveW1H, QueryContext, SensorKind, Severity, Timestamp, NO_INFORMATION,
};

/// Composes and renders the six-field answer.
pub struct ResponseFormatter;

impl ResponseFormatter {
    /// Extract the six fields from a completed context.
    pub fn compose(ctx: &QueryContext) -> FiveW1H {
        FiveW1H {
            who: who(ctx),
            what: what(ctx),
            where_: where_(ctx),
            when: when(ctx),
            why: why(ctx),
            how: how(ctx),
            sources: sources(ctx),
        }
    }

    /// Render the six fields as a stable text block.
    pub fn render(five: &FiveW1H) -> String {
        let mut out = format!(
            "[Who] {}\n[What] {}\n[Where] {}\n[When] {}\n[Why] {}\n[How] {}",
            five.who, five.what, five.where_, five.when, five.why, five.how
        );
        if !five.sources.is_empty() {
            out.push_str(&format!("\n[Sources] {}", five.sources.join(", ")));
        }
        out
    }
}

/// The sensors the answer is about; a question naming none is about the
/// whole system.
fn who(ctx: &QueryContext) -> String {
    let mut tags = ctx.referenced_tags();
    if tags.is_empty() {
        tags = ctx
            .current_readings()
            .iter()
            .map(|r| r.tag.clone())
            .collect();
        tags.dedup();
    }
    if tags.is_empty() {
        "System-wide".to_string()
    } else {
        format!("Sensors {}", tags.join(", "))
    }
}

/// The headline finding: violations first, then the summary a collection
/// already produced, then a bare reading count. A qualitative outlook
/// word from the analysis is appended when one exists.
fn what(ctx: &QueryContext) -> String {
    let headline = what_headline(ctx);
    if headline == NO_INFORMATION {
        return headline;
    }
    match outlook_word(ctx) {
        Some(word) => format!("{headline}; outlook {word}"),
        None => headline,
    }
}

fn what_headline(ctx: &QueryContext) -> String {
    let violations = ctx.violations();
    if !violations.is_empty() {
        let critical = violations
            .iter()
            .filter(|v| v.severity == Severity::Critical)
            .count();
        return format!(
            "{} QC violation(s), {} critical",
            violations.len(),
            critical
        );
    }
    for payload in &ctx.collected {
        if let CollectedPayload::Aggregates { summary, .. } = payload {
            return summary.clone();
        }
    }
    let readings = ctx.current_readings();
    if !readings.is_empty() {
        return format!("{} sensors reporting within expectations", readings.len());
    }
    NO_INFORMATION.to_string()
}

/// One status word lifted from the analysis stage's predictions.
fn outlook_word(ctx: &QueryContext) -> Option<&'static str> {
    for prediction in &ctx.insights.predictions {
        if prediction.contains("stable") {
            return Some("stable");
        }
        if prediction.contains("inspection") {
            return Some("critical");
        }
        if prediction.contains("monitoring") {
            return Some("cautionary");
        }
    }
    None
}

/// Measurement points grouped by physical kind, plus the provenance
/// chain from the store down to the views that served the data.
fn where_(ctx: &QueryContext) -> String {
    let mut kinds: Vec<&'static str> = Vec::new();
    let mut tags = ctx.referenced_tags();
    if tags.is_empty() {
        tags = ctx
            .current_readings()
            .iter()
            .map(|r| r.tag.clone())
            .collect();
    }
    for tag in &tags {
        if let Some(kind) = SensorKind::for_tag(tag) {
            if !kinds.contains(&kind.name()) {
                kinds.push(kind.name());
            }
        }
    }

    let views = sources(ctx);
    match (kinds.is_empty(), views.is_empty()) {
        (true, true) => NO_INFORMATION.to_string(),
        (false, true) => format!("{} measurement points", kinds.join(", ")),
        (true, false) => format!("telemetry store, via {}", views.join(", ")),
        (false, false) => format!(
            "{} measurement points (telemetry store, via {})",
            kinds.join(", "),
            views.join(", ")
        ),
    }
}

/// The span of the data itself, never the formatting time.
fn when(ctx: &QueryContext) -> String {
    let mut earliest: Option<Timestamp> = None;
    let mut latest: Option<Timestamp> = None;
    let mut observe = |ts: Timestamp| {
        earliest = Some(earliest.map_or(ts, |e| e.min(ts)));
        latest = Some(latest.map_or(ts, |l| l.max(ts)));
    };

    for payload in &ctx.collected {
        match payload {
            CollectedPayload::CurrentStatus { readings, .. } => {
                readings.iter().for_each(|r| observe(r.ts))
            }
            CollectedPayload::Comparison { current, .. }
            | CollectedPayload::Overview { current, .. } => {
                current.iter().for_each(|r| observe(r.ts))
            }
            CollectedPayload::Violations { current, .. } => {
                current.iter().for_each(|r| observe(r.ts))
            }
            CollectedPayload::Correlation { samples, .. } => {
                samples.iter().for_each(|r| observe(r.ts))
            }
            CollectedPayload::Aggregates { rows, .. } => {
                for row in rows {
                    if let Some(ts) = row.earliest_bucket {
                        observe(ts);
                    }
                    if let Some(ts) = row.latest_bucket {
                        observe(ts);
                    }
                }
            }
            CollectedPayload::Historical { .. } => {}
        }
    }

    match (earliest, latest) {
        (Some(e), Some(l)) if e == l => e.format("%Y-%m-%d %H:%M UTC").to_string(),
        (Some(e), Some(l)) => format!(
            "{} to {}",
            e.format("%Y-%m-%d %H:%M UTC"),
            l.format("%Y-%m-%d %H:%M UTC")
        ),
        _ => NO_INFORMATION.to_string(),
    }
}

/// Cause or interpretation: worst violation, then predictions.
fn why(ctx: &QueryContext) -> String {
    if let Some(worst) = ctx
        .violations()
        .iter()
        .max_by(|a, b| {
            a.severity.cmp(&b.severity).then(
                a.severity_score
                    .partial_cmp(&b.severity_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        })
    {
        return format!(
            "{} crossed its QC threshold ({:.2} against {:.2})",
            worst.tag, worst.value, worst.threshold
        );
    }
    if !ctx.insights.predictions.is_empty() {
        return ctx.insights.predictions.join(" ");
    }
    NO_INFORMATION.to_string()
}

/// Severity-tiered remediation checklist, extended with the review
/// stage's own recommendations.
fn how(ctx: &QueryContext) -> String {
    if ctx.collected.is_empty() {
        return NO_INFORMATION.to_string();
    }

    let violations = ctx.violations();
    let tier = if violations.iter().any(|v| v.severity == Severity::Critical) {
        "Inspect the affected sensors immediately and halt the process if needed"
    } else if !violations.is_empty() {
        "Monitor the flagged sensors closely"
    } else {
        "Continue routine monitoring"
    };

    let mut steps = vec![tier.to_string()];
    if let Some(report) = &ctx.quality_report {
        for rec in &report.recommendations {
            if !steps.contains(rec) {
                steps.push(rec.clone());
            }
        }
    }
    steps.join("; ")
}

/// Backing views and tables, deduplicated in collection order.
fn sources(ctx: &QueryContext) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    let mut push = |s: String| {
        if !sources.contains(&s) {
            sources.push(s);
        }
    };
    for payload in &ctx.collected {
        match payload {
            CollectedPayload::Aggregates { query, .. } => {
                push(query.resolution.view_name().to_string())
            }
            CollectedPayload::CurrentStatus { .. }
            | CollectedPayload::Overview { .. }
            | CollectedPayload::Comparison { .. } => push("telemetry_latest".to_string()),
            CollectedPayload::Violations { .. } => {
                push("telemetry_latest".to_string());
                push("qc_rules".to_string());
            }
            CollectedPayload::Historical { .. } | CollectedPayload::Correlation { .. } => {
                push("telemetry_agg_1h".to_string())
            }
        }
    }
    sources
}

// =============================================================================
// TESTS
// =============================================================================
