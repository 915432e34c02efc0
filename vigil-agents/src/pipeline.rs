//! Pipeline orchestrator
//!
//! Runs research, analysis, and review in order over one per-question
//! context, merges the dynamic query translator's answer, composes the
//! six-field response, optionally refines it with the hosted model, and
//! gates the result through the hallucination guard. Each stage audit is
//! spawned as its own task and runs concurrently with the next stage; all
//! audits are joined before the answer is returned.
//!
//! `answer` never returns an error: every internal failure degrades to a
//! data-grounded fallback, and the outermost catch degrades to a fixed
//! apology.

use crate::{AnalysisStage, ResearchStage, ReviewStage};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use vigil_audit::AuditEngine;
use vigil_core::{
    AuditResult, CollectedPayload, PipelineStage, PolicyConfig, QueryContext, VigilResult,
};
use vigil_format::ResponseFormatter;
use vigil_llm::{CompletionProvider, CompletionRequest};
use vigil_query::QueryTranslator;
use vigil_store::{KnowledgeIndex, TelemetryStore};
use vigil_validate::{fallback_response, FactContext, ResponseValidator};

const SYSTEM_PROMPT: &str = "You are a sensor-monitoring expert. Answer strictly from the \
provided data; never invent values, sensors, or timeframes. Keep the answer's structure and \
every quoted number intact.";

const APOLOGY: &str = "죄송합니다. 질문을 처리하는 중 문제가 발생했습니다. 잠시 후 다시 시도해 주세요. \
(Sorry - something went wrong while answering this question. Please try again.)";

const WITHHELD_NOTE: &str =
    "(The generated answer was withheld after failing verification; this summary is built \
directly from the collected data.)";

/// Finalized output of one pipeline run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineAnswer {
    pub text: String,
    /// The validator's confidence in the served text, in [0,1].
    pub confidence: f64,
    /// The review stage's overall quality score, in [0,1].
    pub quality_score: f64,
}

/// One per-process orchestrator; each question gets its own context.
pub struct Pipeline {
    store: Arc<dyn TelemetryStore>,
    knowledge: Option<Arc<dyn KnowledgeIndex>>,
    provider: Option<Arc<dyn CompletionProvider>>,
    audit: Arc<AuditEngine>,
    translator: QueryTranslator,
    validator: ResponseValidator,
    research: ResearchStage,
    config: PolicyConfig,
}

impl Pipeline {
    pub fn new(store: Arc<dyn TelemetryStore>, config: PolicyConfig) -> Self {
        Self {
            research: ResearchStage::new(Arc::clone(&store)),
            translator: QueryTranslator::new(Arc::clone(&store)),
            validator: ResponseValidator::new(config.validator.clone()),
            audit: Arc::new(AuditEngine::new(config.audit.clone())),
            store,
            knowledge: None,
            provider: None,
            config,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_knowledge(mut self, index: Arc<dyn KnowledgeIndex>) -> Self {
        self.knowledge = Some(index);
        self
    }

    pub fn audit_engine(&self) -> &Arc<AuditEngine> {
        &self.audit
    }

    /// Answer one question. Total: every failure path degrades to a
    /// usable response.
    pub async fn answer(&self, question: &str) -> PipelineAnswer {
        match self.answer_inner(question).await {
            Ok(answer) => answer,
            Err(err) => {
                tracing::error!(%err, question, "pipeline failed past all fallbacks");
                PipelineAnswer {
                    text: APOLOGY.to_string(),
                    confidence: 0.0,
                    quality_score: 0.0,
                }
            }
        }
    }

    async fn answer_inner(&self, question: &str) -> VigilResult<PipelineAnswer> {
        let mut ctx = QueryContext::new(question);
        let mut audits: Vec<JoinHandle<AuditResult>> = Vec::new();

        let started = Instant::now();
        self.research.run(&mut ctx).await;
        audits.push(self.spawn_audit("ResearchAgent", &ctx, started.elapsed().as_secs_f64()));

        let started = Instant::now();
        AnalysisStage::run(&mut ctx);
        audits.push(self.spawn_audit("AnalysisAgent", &ctx, started.elapsed().as_secs_f64()));

        let started = Instant::now();
        ReviewStage::run(&mut ctx);
        audits.push(self.spawn_audit("ReviewAgent", &ctx, started.elapsed().as_secs_f64()));

        // The translator runs its own absorbed failure path; its answer
        // always merges as one more payload.
        let translated = self.translator.answer(question).await;
        ctx.collect(CollectedPayload::Aggregates {
            query: translated.query,
            rows: translated.rows,
            summary: translated.summary,
        });

        let five = ResponseFormatter::compose(&ctx);
        let base = ResponseFormatter::render(&five);
        ctx.five_w1h = Some(five);

        let knowledge_texts = self.knowledge_texts(question).await;
        let candidate = self.enhance(&mut ctx, question, &base).await;

        let active_tags = match self.store.active_tags().await {
            Ok(tags) => tags,
            Err(err) => {
                ctx.note_error(PipelineStage::Orchestrator, err.to_string());
                Vec::new()
            }
        };
        let facts =
            FactContext::from_context(&ctx, active_tags).with_knowledge_texts(&knowledge_texts);
        let verdict = self.validator.validate(&candidate, &facts);

        let response = if verdict.confidence
            < self.config.validator.strong_disclaimer_threshold
        {
            tracing::warn!(
                confidence = verdict.confidence,
                issues = ?verdict.issues,
                "generated answer rejected, serving data-grounded fallback"
            );
            format!("{}\n\n{WITHHELD_NOTE}", fallback_response(&ctx))
        } else {
            self.validator.apply_disclaimer(&candidate, &verdict)
        };
        ctx.final_response = Some(response.clone());

        // All stage audits settle before the answer leaves the pipeline.
        for handle in audits {
            if let Err(err) = handle.await {
                tracing::warn!(%err, "stage audit task failed");
            }
        }
        Ok(PipelineAnswer {
            text: response,
            confidence: verdict.confidence,
            quality_score: ctx
                .quality_report
                .as_ref()
                .map(|r| r.overall_quality)
                .unwrap_or(0.0),
        })
    }

    fn spawn_audit(
        &self,
        agent: &'static str,
        ctx: &QueryContext,
        elapsed_secs: f64,
    ) -> JoinHandle<AuditResult> {
        let engine = Arc::clone(&self.audit);
        let snapshot = ctx.clone();
        tokio::spawn(async move { engine.audit(agent, &snapshot, elapsed_secs).await })
    }

    async fn knowledge_texts(&self, question: &str) -> Vec<String> {
        let Some(index) = &self.knowledge else {
            return Vec::new();
        };
        match index.search(question, 3).await {
            Ok(entries) => entries.into_iter().map(|e| e.content).collect(),
            Err(err) => {
                tracing::warn!(%err, "knowledge search failed");
                Vec::new()
            }
        }
    }

    /// Ask the hosted model to refine the wording of the composed answer.
    /// Any failure keeps the composed answer.
    async fn enhance(&self, ctx: &mut QueryContext, question: &str, base: &str) -> String {
        let Some(provider) = &self.provider else {
            return base.to_string();
        };
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: format!(
                "Question: {question}\n\nStructured answer from collected data:\n{base}\n\n\
Rewrite this as a concise natural-language answer. Use only the values above."
            ),
            temperature: self.config.llm.temperature,
            max_tokens: self.config.llm.max_tokens,
        };
        match provider.complete(&request).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => base.to_string(),
            Err(err) => {
                tracing::warn!(%err, "completion failed, keeping composed answer");
                ctx.note_error(PipelineStage::Orchestrator, err.to_string());
                base.to_string()
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use vigil_core::{QcRule, SensorReading};
    use vigil_llm::MockCompletionProvider;
    use vigil_store::{MemoryKnowledgeIndex, MemoryTelemetryStore};

    async fn seeded_store() -> Arc<MemoryTelemetryStore> {
        let store = MemoryTelemetryStore::new();
        let now = Utc::now();
        for i in 0..30 {
            store
                .insert_reading(SensorReading::new(
                    "D100",
                    40.0 + (i % 5) as f64,
                    now - Duration::minutes(30 - i),
                ))
                .await;
            store
                .insert_reading(SensorReading::new(
                    "D101",
                    2.0 + (i % 3) as f64 / 10.0,
                    now - Duration::minutes(30 - i),
                ))
                .await;
        }
        store
            .insert_rule(QcRule::banded("D100", (10.0, 80.0), (0.0, 95.0)))
            .await;
        store
            .insert_rule(QcRule::banded("D101", (1.0, 5.0), (0.5, 8.0)))
            .await;
        Arc::new(store)
    }

    fn pipeline(store: Arc<MemoryTelemetryStore>) -> Pipeline {
        Pipeline::new(store, PolicyConfig::default())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_answer_without_provider_renders_composed_fields() {
        let pipeline = pipeline(seeded_store().await);
        let answer = pipeline.answer("현재 상태 알려줘").await;
        assert!(answer.text.contains("[Who]"), "response was: {}", answer.text);
        assert!(answer.text.contains("D100"));
        assert_ne!(answer.text, APOLOGY);
        assert!(answer.confidence > 0.0);
        assert!(answer.quality_score > 0.5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_answer_audits_all_three_stages() {
        let pipeline = pipeline(seeded_store().await);
        pipeline.answer("현재 상태").await;
        let engine = pipeline.audit_engine();
        for agent in ["ResearchAgent", "AnalysisAgent", "ReviewAgent"] {
            let profile = engine.profile_snapshot(agent).await;
            assert_eq!(profile.map(|p| p.total_tasks), Some(1), "agent {agent}");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_hallucinated_completion_is_replaced_by_fallback() {
        let provider = MockCompletionProvider::with_responses(vec![
            "온도 센서가 증가하면서 동시에 감소했습니다. pH 15 수치가 50000입니다.".to_string(),
        ]);
        let pipeline = pipeline(seeded_store().await).with_provider(Arc::new(provider));
        let answer = pipeline.answer("현재 상태 알려줘").await;
        assert!(
            answer.text.contains("withheld after failing verification"),
            "response was: {}",
            answer.text
        );
        assert!(answer.text.contains("Recommendation:"));
        assert!(answer.confidence < 0.5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failing_provider_keeps_composed_answer() {
        let pipeline = pipeline(seeded_store().await)
            .with_provider(Arc::new(MockCompletionProvider::failing()));
        let answer = pipeline.answer("현재 상태").await;
        assert!(answer.text.contains("[Who]"));
        assert_ne!(answer.text, APOLOGY);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_store_still_answers() {
        let pipeline = pipeline(Arc::new(MemoryTelemetryStore::new()));
        let answer = pipeline.answer("아무거나").await;
        assert!(!answer.text.is_empty());
        assert_ne!(answer.text, APOLOGY);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_knowledge_index_feeds_validation() {
        let mut index = MemoryKnowledgeIndex::new(0.1);
        index.add_entry("D100 temperature normal range 10 to 80", "sensor");
        let pipeline = pipeline(seeded_store().await).with_knowledge(Arc::new(index));
        let answer = pipeline.answer("D100 current status").await;
        assert_ne!(answer.text, APOLOGY);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_translated_query_summary_merged() {
        let pipeline = pipeline(seeded_store().await);
        let answer = pipeline.answer("모든 센서의 최근 1시간 평균").await;
        // The translator's per-tag averages surface in the [What] field.
        assert!(
            answer.text.contains("Averages over the last 1 hour"),
            "response: {}",
            answer.text
        );
    }
}
