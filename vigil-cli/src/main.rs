//! Demo entry point
//!
//! Seeds an in-memory store with two hours of sensor data and answers
//! the question given on the command line. With `OPENAI_API_KEY` set the
//! answer is refined by the hosted model; otherwise the composed answer
//! is served as-is, so the demo runs fully offline.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vigil_agents::Pipeline;
use vigil_core::PolicyConfig;
use vigil_llm::{CompletionProvider, OpenAICompletionProvider, OpenAIConfig};
use vigil_test_utils::{demo_knowledge_index, seeded_demo_store};

const DEFAULT_QUESTION: &str = "현재 모든 센서 상태 알려줘";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = PolicyConfig::from_env();
    if let Err(err) = config.validate() {
        eprintln!("invalid configuration: {err}");
        std::process::exit(2);
    }

    let question = {
        let args: Vec<String> = std::env::args().skip(1).collect();
        if args.is_empty() {
            DEFAULT_QUESTION.to_string()
        } else {
            args.join(" ")
        }
    };

    let provider: Option<Arc<dyn CompletionProvider>> = match OpenAIConfig::from_env() {
        Some(openai) => {
            tracing::info!(model = %openai.model, "using hosted completion provider");
            Some(Arc::new(OpenAICompletionProvider::new(openai)))
        }
        None => {
            tracing::info!("OPENAI_API_KEY not set, serving the composed answer directly");
            None
        }
    };

    let store = Arc::new(seeded_demo_store().await);
    let mut pipeline =
        Pipeline::new(store, config).with_knowledge(Arc::new(demo_knowledge_index()));
    if let Some(provider) = provider {
        pipeline = pipeline.with_provider(provider);
    }

    let answer = pipeline.answer(&question).await;
    println!("Q: {question}\n");
    println!("{}\n", answer.text);
    println!(
        "confidence {:.2}, quality {:.2}\n",
        answer.confidence, answer.quality_score
    );

    let engine = pipeline.audit_engine();
    for agent in ["ResearchAgent", "AnalysisAgent", "ReviewAgent"] {
        if let Some(profile) = engine.profile_snapshot(agent).await {
            println!(
                "{agent}: avg {:.1}, {} task(s), learning rate {:.3}",
                profile.average_score, profile.total_tasks, profile.learning_rate
            );
        }
    }
}
