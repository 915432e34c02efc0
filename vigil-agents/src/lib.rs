//! VIGIL Agents - The three-stage answering pipeline
//!
//! Research collects, analysis interprets, review judges; the
//! orchestrator threads one `QueryContext` through all three, audits
//! each stage concurrently, and produces the final validated answer.

mod analysis;
mod pipeline;
mod research;
mod review;

pub use analysis::AnalysisStage;
pub use pipeline::{Pipeline, PipelineAnswer};
pub use research::{scan_violations, ResearchStage};
pub use review::ReviewStage;
