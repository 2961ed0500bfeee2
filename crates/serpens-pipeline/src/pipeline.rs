use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{Instrument as _, error, info, info_span};
use uuid::Uuid;

use serpens_core::config::PipelineConfig;
use serpens_core::{
    AnswerResult, EmbeddingProvider, Error, Intent, ModelProvider, Result, ServiceConfig, Stage,
};
use serpens_search::{HybridQueryBuilder, ResultFilter, SearchBackend};

use crate::cache::{EmbeddingCache, IntentCache};
use crate::generation::GenerationPolicy;
use crate::intent::{IntentOrigin, IntentParser};
use crate::synthesizer::AnswerSynthesizer;

/// Backends the pipeline talks to.
pub struct Backends {
    /// Model used for intent extraction.
    pub intent: Arc<dyn ModelProvider>,
    /// Model used for answer summarization.
    pub summary: Arc<dyn ModelProvider>,
    /// Query embedder.
    pub embedding: Arc<dyn EmbeddingProvider>,
    /// Retrieval backend.
    pub search: Arc<dyn SearchBackend>,
}

/// The per-request question answering pipeline.
pub struct AskPipeline {
    parser: IntentParser,
    embeddings: EmbeddingCache,
    builder: HybridQueryBuilder,
    search: Arc<dyn SearchBackend>,
    search_timeout: Duration,
    filter: ResultFilter,
    synthesizer: AnswerSynthesizer,
    limits: PipelineConfig,
}

impl AskPipeline {
    /// Wire the pipeline from config and backends.
    pub fn new(config: &ServiceConfig, backends: Backends) -> Self {
        let generation = &config.generation;
        let parser = IntentParser::new(
            backends.intent,
            IntentCache::from_config(&config.cache),
            GenerationPolicy::new(
                Stage::IntentParse,
                Duration::from_millis(generation.intent_timeout_ms),
                generation.max_retries,
            ),
        );
        let embeddings = EmbeddingCache::new(
            backends.embedding,
            EmbeddingCache::storage_from_config(&config.cache),
            Duration::from_millis(config.embedding.timeout_ms),
            config.embedding.dimensions,
        );
        let synthesizer = AnswerSynthesizer::new(
            backends.summary,
            GenerationPolicy::new(
                Stage::Summarize,
                Duration::from_millis(generation.summarize_timeout_ms),
                generation.max_retries,
            ),
            &config.pipeline,
        );

        Self {
            parser,
            embeddings,
            builder: HybridQueryBuilder::from_config(&config.search),
            search: backends.search,
            search_timeout: Duration::from_millis(config.search.timeout_ms),
            filter: ResultFilter::new(config.search.score_threshold),
            synthesizer,
            limits: config.pipeline.clone(),
        }
    }

    /// Parse a question without searching, applying the same validation as
    /// [`AskPipeline::ask`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidQuestion`] for blank, too short or too long
    /// questions.
    pub async fn interpret(&self, question: &str) -> Result<(Intent, IntentOrigin)> {
        let question = self.validate(question)?;
        Ok(self.parser.parse_traced(question).await)
    }

    /// Answer one question.
    ///
    /// # Errors
    /// Returns [`Error::InvalidQuestion`] for blank, too short or too long
    /// questions, and an embedding or retrieval error when those backends fail.
    /// Generative failures never surface here; they degrade the answer instead.
    pub async fn ask(&self, question: &str) -> Result<AnswerResult> {
        let request_id = Uuid::new_v4();
        let span = info_span!("ask", %request_id);
        self.answer(question).instrument(span).await
    }

    async fn answer(&self, question: &str) -> Result<AnswerResult> {
        let started = Instant::now();
        let question = self.validate(question)?;

        let intent = self.parser.parse(question).await;
        info!(?intent, "intent parsed");

        let vector = self.embeddings.embed(question).await.inspect_err(|error| {
            error!(%error, "embedding failed");
        })?;

        let query = self.builder.build(&intent, vector, question);
        let hits = match timeout(self.search_timeout, self.search.search(&query)).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(failure)) => {
                error!(backend = self.search.name(), error = %failure, "retrieval failed");
                return Err(match failure {
                    Error::Retrieval(_) => failure,
                    other => Error::Retrieval(other.to_string()),
                });
            }
            Err(_elapsed) => {
                let millis = self.search_timeout.as_millis() as u64;
                error!(backend = self.search.name(), millis, "retrieval timed out");
                return Err(Error::Timeout {
                    stage: Stage::Retrieval,
                    millis,
                });
            }
        };
        info!(retrieved = hits.len(), "search complete");

        let hits = self.filter.apply(hits);
        Ok(self.synthesizer.synthesize(question, &intent, &hits, started).await)
    }

    fn validate<'question>(&self, question: &'question str) -> Result<&'question str> {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidQuestion("question is empty".to_owned()));
        }
        let length = trimmed.chars().count();
        if length < self.limits.min_question_chars {
            return Err(Error::InvalidQuestion(format!(
                "question must be at least {} characters",
                self.limits.min_question_chars
            )));
        }
        if length > self.limits.max_question_chars {
            return Err(Error::InvalidQuestion(format!(
                "question must be at most {} characters",
                self.limits.max_question_chars
            )));
        }
        Ok(trimmed)
    }
}
