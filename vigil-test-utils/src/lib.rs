//! Shared fixtures and property-test strategies
//!
//! Seeded in-memory stores for integration tests and the demo binary,
//! plus proptest strategies for the core value types.

use chrono::{Duration, Utc};
use vigil_core::{QcRule, SensorReading};
use vigil_store::{MemoryKnowledgeIndex, MemoryTelemetryStore};

/// The demo sensor set: temperature, pressure, and flow.
pub const DEMO_TAGS: [&str; 3] = ["D100", "D101", "D102"];

/// QC rules for the demo sensor set.
pub fn demo_rules() -> Vec<QcRule> {
    vec![
        QcRule::banded("D100", (10.0, 80.0), (0.0, 95.0)),
        QcRule::banded("D101", (1.0, 5.0), (0.5, 8.0)),
        QcRule::banded("D102", (50.0, 200.0), (20.0, 250.0)),
    ]
}

/// A store with two hours of per-minute data for the demo sensors and
/// their QC rules. Values follow a slow deterministic wave so summaries
/// have something to say.
pub async fn seeded_demo_store() -> MemoryTelemetryStore {
    let store = MemoryTelemetryStore::new();
    let now = Utc::now();
    for minute in 0..120i64 {
        let ts = now - Duration::minutes(120 - minute);
        let phase = (minute as f64 / 15.0).sin();
        store
            .insert_reading(SensorReading::new("D100", 45.0 + 5.0 * phase, ts))
            .await;
        store
            .insert_reading(SensorReading::new("D101", 2.5 + 0.4 * phase, ts))
            .await;
        store
            .insert_reading(SensorReading::new("D102", 120.0 + 20.0 * phase, ts))
            .await;
    }
    for rule in demo_rules() {
        store.insert_rule(rule).await;
    }
    store
}

/// A small knowledge index describing the demo sensors.
pub fn demo_knowledge_index() -> MemoryKnowledgeIndex {
    let mut index = MemoryKnowledgeIndex::new(0.1);
    index.add_entry(
        "D100 temperature sensor normal range 10 to 80 degrees",
        "sensor",
    );
    index.add_entry("D101 pressure sensor normal range 1 to 5 bar", "sensor");
    index.add_entry(
        "D102 flow sensor normal range 50 to 200 liters per minute",
        "sensor",
    );
    index
}

// ============================================================================
// PROPTEST STRATEGIES
// ============================================================================

pub mod strategies {
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use vigil_core::{QcRule, SensorReading, Timestamp};

    /// A tag from the demo namespace.
    pub fn arb_tag() -> impl Strategy<Value = String> {
        (0u32..400).prop_map(|n| format!("D{:03}", 100 + n % 300))
    }

    /// A timestamp within March 2025, minute-aligned.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (0i64..40_000).prop_map(|minutes| {
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0)
                .single()
                .map(|t0| t0 + Duration::minutes(minutes))
                .unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_reading() -> impl Strategy<Value = SensorReading> {
        (arb_tag(), -50.0f64..300.0, arb_timestamp())
            .prop_map(|(tag, value, ts)| SensorReading::new(tag, value, ts))
    }

    /// A rule whose warning band sits inside its critical band.
    pub fn arb_rule() -> impl Strategy<Value = QcRule> {
        (arb_tag(), 0.0f64..50.0, 1.0f64..100.0, 1.0f64..50.0).prop_map(
            |(tag, warn_min, warn_span, crit_margin)| {
                let warn_max = warn_min + warn_span;
                QcRule::banded(
                    tag,
                    (warn_min, warn_max),
                    (warn_min - crit_margin, warn_max + crit_margin),
                )
            },
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
