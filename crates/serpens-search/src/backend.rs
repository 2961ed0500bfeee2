use async_trait::async_trait;

use serpens_core::{Result, ScoredDocument};

use crate::RetrievalQuery;

/// Trait for retrieval backends executing hybrid queries.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Returns the unique identifier for this backend.
    fn name(&self) -> &'static str;

    /// Whether the backend answers at all.
    async fn ping(&self) -> bool;

    /// Execute `query`, returning at most `query.limit()` hits, best first.
    ///
    /// # Errors
    /// Returns [`Error::Retrieval`](serpens_core::Error::Retrieval) when the
    /// backend is unreachable or its reply cannot be read.
    async fn search(&self, query: &RetrievalQuery) -> Result<Vec<ScoredDocument>>;
}
