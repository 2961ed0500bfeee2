use async_trait::async_trait;
use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::GenerateEmbeddingsRequest;
use tracing::debug;

use serpens_core::config::EmbeddingConfig;
use serpens_core::{EmbeddingProvider, Error, Result};

/// Embedding client backed by a local Ollama server.
pub struct OllamaEmbedder {
    /// Ollama client
    ollama: Ollama,
    /// Embedding model name
    model: String,
}

impl OllamaEmbedder {
    /// Create a client for `model` at `host:port`.
    pub fn new(host: impl Into<String>, port: u16, model: impl Into<String>) -> Self {
        Self {
            ollama: Ollama::new(host.into(), port),
            model: model.into(),
        }
    }

    /// Create a client from the embedding section of the service config.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(config.host.clone(), config.port, config.model.clone())
    }

    /// Model this client asks for.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), text.to_owned().into());

        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|error| {
                let error_str = format!("{error:?}");
                if error_str.contains("model") && error_str.contains("not found") {
                    Error::Embedding(format!(
                        "Embedding model '{}' not found. Run: ollama pull {}",
                        self.model, self.model
                    ))
                } else {
                    Error::Embedding(format!("Embedding generation failed: {error}"))
                }
            })?;

        // Ollama returns one vector per input; we send exactly one input
        let vector = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embeddings returned".to_owned()))?;
        debug!(model = %self.model, dimensions = vector.len(), "ollama embedding");
        Ok(vector)
    }
}
