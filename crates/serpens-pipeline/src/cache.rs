//! Bounded, time-limited caches for parsed intents and query embeddings.
//!
//! Keys are blake3 hashes of the trimmed text. Entries produced by a
//! transient backend failure are marked provisional and expire on a much
//! shorter clock so the next request after the outage recomputes them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache;
use tokio::spawn;
use tokio::time::timeout;
use tracing::{debug, warn};

use serpens_core::config::CacheConfig;
use serpens_core::{EmbeddingProvider, Error, Intent, Result, Stage};

/// 32-byte content hash of trimmed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Key for `text`, ignoring surrounding whitespace.
    pub fn of(text: &str) -> Self {
        Self(*blake3::hash(text.trim().as_bytes()).as_bytes())
    }
}

/// A cached value with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Content hash the value was stored under.
    pub key: CacheKey,
    /// Cached value.
    pub value: V,
    /// When the value was stored.
    pub inserted_at: Instant,
    /// Whether the value stands in for a transient failure.
    pub provisional: bool,
}

/// Per-entry lifetime: regular or provisional.
struct EntryExpiry {
    ttl: Duration,
    provisional_ttl: Duration,
}

impl EntryExpiry {
    fn lifetime<V>(&self, entry: &CacheEntry<V>) -> Duration {
        if entry.provisional {
            self.provisional_ttl
        } else {
            self.ttl
        }
    }
}

impl<V> Expiry<CacheKey, CacheEntry<V>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.lifetime(value))
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.lifetime(value))
    }
}

/// Capacity-bounded cache with per-entry expiry. Clones share storage.
#[derive(Clone)]
pub struct BoundedCache<V> {
    cache: Cache<CacheKey, CacheEntry<V>>,
}

impl<V: Clone + Send + Sync + 'static> BoundedCache<V> {
    /// Cache holding at most `capacity` entries.
    pub fn new(capacity: u64, ttl: Duration, provisional_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .expire_after(EntryExpiry {
                ttl,
                provisional_ttl,
            })
            .build();
        Self { cache }
    }

    /// Look up a value.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.cache.get(key).map(|entry| entry.value)
    }

    /// Look up an entry with its bookkeeping.
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        self.cache.get(key)
    }

    /// Store a value with the regular lifetime.
    pub fn insert(&self, key: CacheKey, value: V) {
        self.store(key, value, false);
    }

    /// Store a value with the provisional lifetime.
    pub fn insert_provisional(&self, key: CacheKey, value: V) {
        self.store(key, value, true);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    fn store(&self, key: CacheKey, value: V, provisional: bool) {
        self.cache.insert(
            key,
            CacheEntry {
                key,
                value,
                inserted_at: Instant::now(),
                provisional,
            },
        );
    }
}

/// Cache of parsed intents keyed by question.
pub type IntentCache = BoundedCache<Intent>;

impl IntentCache {
    /// Intent cache sized from config.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.intent_capacity, config.ttl(), config.provisional_ttl())
    }
}

/// Query embeddings, fetched from the backend on a miss.
pub struct EmbeddingCache {
    cache: BoundedCache<Vec<f32>>,
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
    dimensions: usize,
}

impl EmbeddingCache {
    /// Embedding cache in front of `provider`.
    ///
    /// `dimensions` of 0 disables the length check.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        cache: BoundedCache<Vec<f32>>,
        timeout: Duration,
        dimensions: usize,
    ) -> Self {
        Self {
            cache,
            provider,
            timeout,
            dimensions,
        }
    }

    /// Storage sized from config.
    pub fn storage_from_config(config: &CacheConfig) -> BoundedCache<Vec<f32>> {
        BoundedCache::new(config.embedding_capacity, config.ttl(), config.provisional_ttl())
    }

    /// Embedding of the trimmed `text`.
    ///
    /// On a miss the backend call runs in its own task, so the cache write
    /// completes even if this future is dropped or times out.
    ///
    /// # Errors
    /// Returns [`Error::Embedding`] if the backend fails or returns a vector of
    /// the wrong length, and [`Error::Timeout`] if it does not answer in time.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = CacheKey::of(text);
        if let Some(vector) = self.cache.get(&key) {
            debug!("embedding cache hit");
            return Ok(vector);
        }

        let provider = Arc::clone(&self.provider);
        let cache = self.cache.clone();
        let dimensions = self.dimensions;
        let text = text.trim().to_owned();

        let task = spawn(async move {
            let vector = provider.embed(&text).await.map_err(|error| match error {
                Error::Embedding(_) => error,
                other => Error::Embedding(other.to_string()),
            })?;
            if dimensions > 0 && vector.len() != dimensions {
                return Err(Error::Embedding(format!(
                    "{} returned {} dimensions, expected {dimensions}",
                    provider.name(),
                    vector.len()
                )));
            }
            cache.insert(key, vector.clone());
            Ok(vector)
        });

        match timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::Embedding(format!(
                "embedding task failed: {join_error}"
            ))),
            Err(_elapsed) => {
                warn!(millis = self.timeout.as_millis() as u64, "embedding timed out");
                Err(Error::Timeout {
                    stage: Stage::Embedding,
                    millis: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Drop every cached vector, e.g. after switching embedding models.
    pub fn clear(&self) {
        self.cache.clear();
    }
}
