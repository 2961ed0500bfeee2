use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tokio::time::timeout;
use tracing::{error, info, warn};

use serpens_core::{AnswerResult, EmbeddingProvider as _, ModelProvider, ServiceConfig};
use serpens_pipeline::{AskPipeline, Backends};
use serpens_providers::{MockProvider, OllamaEmbedder, OpenRouterProvider};
use serpens_search::{ElasticsearchBackend, SearchBackend as _};

/// Shown instead of an answer when embedding or retrieval is down.
pub const BUSY_MESSAGE: &str = "Hệ thống đang bận, vui lòng thử lại sau.";

/// Load config from `path` (or the default location), creating it on first run.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let config = match path {
        Some(path) => ServiceConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ServiceConfig::load_or_create(&ServiceConfig::config_path()?)?,
    };
    Ok(config.with_env_overrides())
}

/// Generative provider for both intent parsing and summarization.
///
/// Without an API key every generative call fails, so intents fall back to
/// the default and answers use the offline formatter.
fn generative_provider(config: &ServiceConfig) -> Arc<dyn ModelProvider> {
    match OpenRouterProvider::from_config_or_env(config.openrouter_api_key()) {
        Ok(provider) => Arc::new(
            provider
                .with_model(config.generation.model.clone())
                .with_attribution(
                    config.generation.site_url.clone(),
                    config.generation.site_name.clone(),
                ),
        ),
        Err(error) => {
            warn!(%error, "no OpenRouter key configured, generative steps are disabled");
            Arc::new(MockProvider::new("offline").with_failure())
        }
    }
}

fn build_pipeline(config: &ServiceConfig) -> AskPipeline {
    let generative = generative_provider(config);
    let backends = Backends {
        intent: Arc::clone(&generative),
        summary: generative,
        embedding: Arc::new(OllamaEmbedder::from_config(&config.embedding)),
        search: Arc::new(ElasticsearchBackend::from_config(&config.search)),
    };
    AskPipeline::new(config, backends)
}

fn render_answer(answer: &AnswerResult) -> String {
    let mut output = answer.answer_text.clone();
    if !answer.source_names.is_empty() {
        let sources: Vec<&str> = answer.source_names.iter().map(String::as_str).collect();
        output.push_str(&format!("\n\nNguồn: {}", sources.join(", ")));
    }
    if let Some(note) = &answer.note {
        output.push_str(&format!("\n({note})"));
    }
    output
}

/// Answer a question and print it.
pub async fn handle_ask(config: &ServiceConfig, question: &str, json: bool) -> Result<ExitCode> {
    let pipeline = build_pipeline(config);

    match pipeline.ask(question).await {
        Ok(answer) => {
            info!(mode = ?answer.mode, latency_ms = answer.latency.as_millis() as u64, "answered");
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{}", render_answer(&answer));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) if failure.is_service_failure() => {
            error!(error = %failure, "backend unavailable");
            println!("{BUSY_MESSAGE}");
            Ok(ExitCode::FAILURE)
        }
        Err(failure) => {
            error!(error = %failure, "question rejected");
            Ok(ExitCode::from(2))
        }
    }
}

/// Parse a question and print the intent and where it came from.
pub async fn handle_intent(config: &ServiceConfig, question: &str) -> Result<ExitCode> {
    let pipeline = build_pipeline(config);
    match pipeline.interpret(question).await {
        Ok((intent, origin)) => {
            println!("{}", serde_json::to_string_pretty(&intent)?);
            info!(%origin, "intent resolved");
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            error!(error = %failure, "question rejected");
            Ok(ExitCode::from(2))
        }
    }
}

/// Probe each backend once.
pub async fn handle_ping(config: &ServiceConfig) -> ExitCode {
    let search = ElasticsearchBackend::from_config(&config.search);
    let search_up = search.ping().await;

    let embedder = OllamaEmbedder::from_config(&config.embedding);
    let embed_timeout = Duration::from_millis(config.embedding.timeout_ms);
    let embedding_up = matches!(timeout(embed_timeout, embedder.embed("ping")).await, Ok(Ok(_)));

    let generative_up = generative_provider(config).is_available().await;

    let status = |up: bool| if up { "ok" } else { "unavailable" };
    println!("elasticsearch  {}  ({})", status(search_up), config.search.url);
    println!(
        "embedding      {}  ({}:{}, {})",
        status(embedding_up),
        config.embedding.host,
        config.embedding.port,
        embedder.model()
    );
    println!("generation     {}  ({})", status(generative_up), config.generation.model);

    if search_up && embedding_up {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Print the effective configuration as TOML, with secrets masked.
pub fn handle_config(config: &ServiceConfig) -> Result<ExitCode> {
    println!("{}", masked_toml(config)?);
    Ok(ExitCode::SUCCESS)
}

fn masked_toml(config: &ServiceConfig) -> Result<String> {
    let mut shown = config.clone();
    if shown.api_keys.openrouter_api_key.is_some() {
        shown.api_keys.openrouter_api_key = Some("********".to_owned());
    }
    Ok(toml::to_string_pretty(&shown)?)
}
