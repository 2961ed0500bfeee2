use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash as _, Hasher as _};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::spawn_blocking;

use serpens_core::text::fold;
use serpens_core::{EmbeddingProvider, Error, LocalEmbedder, Result};

/// Deterministic hashed bag-of-words embedder.
///
/// Each folded token lands in one bucket with a hash-derived sign, and the
/// result is L2-normalized, so texts sharing words have positive cosine
/// similarity. Useful offline and in tests; it carries no semantics beyond
/// word overlap.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Create an embedder producing vectors of `dimensions` (at least 1).
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Output dimension.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl LocalEmbedder for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn embed_blocking(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in fold(text).split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }
}

/// Adapter running a [`LocalEmbedder`] on the blocking thread pool so CPU-bound
/// inference never stalls the async workers.
pub struct Blocking<T> {
    inner: Arc<T>,
}

impl<T: LocalEmbedder> Blocking<T> {
    /// Wrap an embedder.
    pub fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl<T: LocalEmbedder + 'static> EmbeddingProvider for Blocking<T> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_owned();
        spawn_blocking(move || inner.embed_blocking(&text))
            .await
            .map_err(|error| Error::Embedding(format!("embedding task failed: {error}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(first: &[f32], second: &[f32]) -> f32 {
        first.iter().zip(second).map(|(left, right)| left * right).sum()
    }

    #[test]
    fn test_hash_embedding_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let first = embedder.embed_blocking("Rắn hổ mang chúa").unwrap();
        let second = embedder.embed_blocking("rắn hổ mang chúa").unwrap();
        assert_eq!(first, second, "Folding makes case and diacritics irrelevant");
        assert_eq!(first.len(), 64);
        let norm = first.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_words_score_higher() {
        let embedder = HashEmbedder::default();
        let query = embedder.embed_blocking("ho mang chua").unwrap();
        let related = embedder.embed_blocking("ran ho mang chua").unwrap();
        let unrelated = embedder.embed_blocking("trăn gấm").unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let vector = HashEmbedder::new(8).embed_blocking("   ").unwrap();
        assert!(vector.iter().all(|value| value.abs() < f32::EPSILON));
    }

    #[tokio::test]
    async fn test_blocking_adapter_matches_direct_call() {
        let direct = HashEmbedder::new(32).embed_blocking("rắn lục").unwrap();
        let adapter = Blocking::new(HashEmbedder::new(32));
        let pooled = adapter.embed("rắn lục").await.unwrap();
        assert_eq!(direct, pooled);
        assert_eq!(adapter.name(), "hash");
    }
}
