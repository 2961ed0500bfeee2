//! Provider adapters for the external generative and embedding services.
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

/// In-process embedders and the blocking-pool adapter.
pub mod local;
/// Scriptable provider for tests and offline runs.
pub mod mock;
/// Ollama embedding client.
pub mod ollama;
/// `OpenRouter` chat-completions provider.
pub mod openrouter;

pub use local::{Blocking, HashEmbedder};
pub use mock::MockProvider;
pub use ollama::OllamaEmbedder;
pub use openrouter::OpenRouterProvider;
