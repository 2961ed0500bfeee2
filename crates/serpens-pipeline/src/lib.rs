//! Per-request question answering: intent, embedding, hybrid search, answer.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        reason = "Test allows"
    )
)]

/// Intent and embedding caches.
pub mod cache;
/// Timeout and retry handling for generative calls.
pub mod generation;
/// Intent extraction.
pub mod intent;
/// Keyword markers for the deterministic intent path.
pub mod markers;
/// Request orchestration.
pub mod pipeline;
/// Answer synthesis and the offline formatter.
pub mod synthesizer;

pub use cache::{BoundedCache, CacheEntry, CacheKey, EmbeddingCache, IntentCache};
pub use generation::{GenerationFailure, GenerationPolicy};
pub use intent::{IntentOrigin, IntentParser, ParseFailure};
pub use pipeline::{AskPipeline, Backends};
pub use synthesizer::{AnswerSynthesizer, danger_glyph};
