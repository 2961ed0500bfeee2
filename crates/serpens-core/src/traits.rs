use async_trait::async_trait;

use crate::{Context, Query, Response, Result};

/// Trait for generative model providers (intent extraction and summarization).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Returns the identifier for this provider.
    fn name(&self) -> &str;

    /// Checks whether this provider is configured and ready to process requests.
    async fn is_available(&self) -> bool;

    /// Generates a response to the given query using the provided context.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unavailable, the request fails,
    /// or the response cannot be parsed.
    async fn generate(&self, query: &Query, context: &Context) -> Result<Response>;
}

/// Trait for embedding backends that perform their own I/O.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the unique identifier for this provider.
    fn name(&self) -> &'static str;

    /// Generate the embedding vector for `text`.
    ///
    /// # Errors
    /// Returns an error if the backend is unreachable or returns no vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Trait for in-process, CPU-bound embedders.
///
/// These block the calling thread, so they are driven through an adapter that
/// moves the work onto the blocking pool.
pub trait LocalEmbedder: Send + Sync {
    /// Returns the unique identifier for this embedder.
    fn name(&self) -> &'static str;

    /// Generate the embedding vector for `text`.
    ///
    /// # Errors
    /// Returns an error if the model cannot produce a vector.
    fn embed_blocking(&self, text: &str) -> Result<Vec<f32>>;
}
