//! Deterministic fallback responses
//!
//! When the generated answer fails validation (or no model is available)
//! the pipeline falls back to a template rendered purely from collected
//! data. Classification is keyword-driven and total.

use vigil_core::{CollectedPayload, QueryContext, SensorKind, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FallbackClass {
    Correlation,
    Comparison,
    Alert,
    Status,
    Trend,
    Summary,
}

fn classify(question: &str) -> FallbackClass {
    let lowered = question.to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| lowered.contains(k));

    if has(&["상관", "correlation", "관계"]) {
        FallbackClass::Correlation
    } else if has(&["어제", "비교", "변화"]) {
        FallbackClass::Comparison
    } else if has(&["경고", "알람", "alert", "주의", "위험", "알림"]) {
        FallbackClass::Alert
    } else if has(&["상태", "status"]) {
        FallbackClass::Status
    } else if has(&["트렌드"]) {
        FallbackClass::Trend
    } else {
        FallbackClass::Summary
    }
}

/// Render a response for `ctx` from collected data alone.
pub fn fallback_response(ctx: &QueryContext) -> String {
    let body = match classify(&ctx.query) {
        FallbackClass::Correlation => render_correlation(ctx),
        FallbackClass::Comparison => render_comparison(ctx),
        FallbackClass::Alert => render_alert(ctx),
        FallbackClass::Status => render_status(ctx),
        FallbackClass::Trend => render_trend(ctx),
        FallbackClass::Summary => render_summary(ctx),
    };
    format!("{body}\n\n{}", recommendation(ctx))
}

/// Action recommendation from the worst collected violation severity.
fn recommendation(ctx: &QueryContext) -> String {
    let worst = ctx.violations().iter().map(|v| v.severity).max();
    match worst {
        Some(Severity::Critical) => {
            "Recommendation: inspect the affected sensors immediately and halt the process if needed.".to_string()
        }
        Some(Severity::Warning) | Some(Severity::Minor) => {
            "Recommendation: monitor the flagged sensors closely.".to_string()
        }
        None => "Recommendation: continue routine monitoring.".to_string(),
    }
}

fn render_status(ctx: &QueryContext) -> String {
    let readings = ctx.current_readings();
    if readings.is_empty() {
        return "No current sensor readings are available.".to_string();
    }
    let rules = ctx.rules();
    let lines: Vec<String> = readings
        .iter()
        .map(|r| {
            let unit = SensorKind::for_tag(&r.tag).map(|k| k.unit()).unwrap_or("");
            let status = rules
                .iter()
                .find(|rule| rule.tag == r.tag)
                .map(|rule| format!("{:?}", rule.evaluate(r.value)))
                .unwrap_or_else(|| "Unchecked".to_string());
            format!("- {}: {:.2} {} ({})", r.tag, r.value, unit, status)
        })
        .collect();
    format!("Current sensor status:\n{}", lines.join("\n"))
}

fn render_alert(ctx: &QueryContext) -> String {
    let violations = ctx.violations();
    if violations.is_empty() {
        return "No QC rule violations were found in the current readings.".to_string();
    }
    let lines: Vec<String> = violations
        .iter()
        .map(|v| {
            format!(
                "- {}: {:.2} crossed the {:.2} threshold ({:?})",
                v.tag, v.value, v.threshold, v.severity
            )
        })
        .collect();
    let rate = ctx
        .violation_rate()
        .map(|r| format!(" ({r:.1}% of sensors affected)"))
        .unwrap_or_default();
    format!(
        "{} QC violation(s) detected{rate}:\n{}",
        violations.len(),
        lines.join("\n")
    )
}

fn render_comparison(ctx: &QueryContext) -> String {
    for payload in &ctx.collected {
        if let CollectedPayload::Comparison { top_changes, .. } = payload {
            if top_changes.is_empty() {
                break;
            }
            let lines: Vec<String> = top_changes
                .iter()
                .map(|row| {
                    format!(
                        "- {}: {:.2} yesterday -> {:.2} today ({:+.1}%)",
                        row.tag, row.yesterday_avg, row.today_avg, row.pct_change
                    )
                })
                .collect();
            return format!("Largest changes since yesterday:\n{}", lines.join("\n"));
        }
    }
    "No comparison data is available for yesterday versus today.".to_string()
}

fn render_correlation(ctx: &QueryContext) -> String {
    for payload in &ctx.collected {
        if let CollectedPayload::Correlation { tags, stats, .. } = payload {
            let lines: Vec<String> = stats
                .iter()
                .map(|s| {
                    format!(
                        "- {}: avg {:.2}, range {:.2} to {:.2} over {} samples",
                        s.tag, s.avg, s.min, s.max, s.count
                    )
                })
                .collect();
            return format!(
                "Statistics for {} over the correlation window:\n{}",
                tags.join(", "),
                lines.join("\n")
            );
        }
    }
    "At least two sensors are needed for a correlation view; current data follows.\n".to_string()
        + &render_status(ctx)
}

fn render_trend(ctx: &QueryContext) -> String {
    for payload in &ctx.collected {
        if let CollectedPayload::Historical {
            window_days,
            summary,
            ..
        } = payload
        {
            if summary.is_empty() {
                break;
            }
            let lines: Vec<String> = summary
                .iter()
                .map(|s| {
                    format!(
                        "- {}: avg {:.2}, min {:.2}, max {:.2} ({} samples)",
                        s.tag, s.avg, s.min, s.max, s.count
                    )
                })
                .collect();
            return format!(
                "Trend over the last {window_days} day(s):\n{}",
                lines.join("\n")
            );
        }
    }
    "No historical data is available for the requested window.".to_string()
}

fn render_summary(ctx: &QueryContext) -> String {
    let mut sections = vec![render_status(ctx)];
    if !ctx.insights.predictions.is_empty() {
        sections.push(format!("Outlook: {}", ctx.insights.predictions.join(" ")));
    }
    for payload in &ctx.collected {
        if let CollectedPayload::Overview { statistics, .. } = payload {
            sections.push(format!(
                "Store: {} sensors, {} records.",
                statistics.total_sensors, statistics.total_records
            ));
        }
        if let CollectedPayload::Aggregates { summary, .. } = payload {
            sections.push(summary.clone());
        }
    }
    sections.join("\n\n")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vigil_core::{ComparisonRow, SensorReading, Violation, ViolationBound};

    #[test]
    fn test_classification_keywords() {
        assert_eq!(classify("D100과 D101의 상관 관계"), FallbackClass::Correlation);
        assert_eq!(classify("어제와 비교해줘"), FallbackClass::Comparison);
        assert_eq!(classify("경고 있어?"), FallbackClass::Alert);
        assert_eq!(classify("current status please"), FallbackClass::Status);
        assert_eq!(classify("온도 트렌드"), FallbackClass::Trend);
        assert_eq!(classify("전반적으로 어때"), FallbackClass::Summary);
    }

    #[test]
    fn test_empty_context_still_renders() {
        let ctx = QueryContext::new("상태 알려줘");
        let response = fallback_response(&ctx);
        assert!(response.contains("No current sensor readings"));
        assert!(response.contains("routine monitoring"));
    }

    #[test]
    fn test_status_render_includes_units_and_levels() {
        let mut ctx = QueryContext::new("status");
        ctx.collect(CollectedPayload::CurrentStatus {
            target_tags: vec!["D100".to_string()],
            readings: vec![SensorReading::new("D100", 45.2, Utc::now())],
            rules: vec![vigil_core::QcRule::banded("D100", (10.0, 80.0), (0.0, 95.0))],
        });
        let response = fallback_response(&ctx);
        assert!(response.contains("D100: 45.20 °C (Normal)"));
    }

    #[test]
    fn test_critical_violation_drives_recommendation() {
        let mut ctx = QueryContext::new("알람 확인");
        ctx.collect(CollectedPayload::Violations {
            violations: vec![Violation {
                tag: "D101".to_string(),
                value: 9.5,
                threshold: 5.0,
                bound: ViolationBound::Max,
                severity: Severity::Critical,
                severity_score: 4.5,
            }],
            total_sensors: 3,
            violation_rate: 33.3,
            current: vec![],
            rules: vec![],
        });
        let response = fallback_response(&ctx);
        assert!(response.contains("1 QC violation"));
        assert!(response.contains("33.3%"));
        assert!(response.contains("inspect the affected sensors immediately"));
    }

    #[test]
    fn test_comparison_render() {
        let mut ctx = QueryContext::new("어제 대비 변화");
        let row = ComparisonRow {
            tag: "D100".to_string(),
            yesterday_avg: 40.0,
            today_avg: 44.0,
            change: 4.0,
            pct_change: 10.0,
        };
        ctx.collect(CollectedPayload::Comparison {
            rows: vec![row.clone()],
            top_changes: vec![row],
            current: vec![],
            rules: vec![],
        });
        let response = fallback_response(&ctx);
        assert!(response.contains("40.00 yesterday -> 44.00 today (+10.0%)"));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let ctx = QueryContext::new("상태");
        assert_eq!(fallback_response(&ctx), fallback_response(&ctx));
    }
}
