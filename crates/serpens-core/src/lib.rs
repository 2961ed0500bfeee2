//! Core types and traits for the Serpens question-answering pipeline.
//!
//! This crate provides the domain model (intents, scored documents, answers),
//! error handling, configuration and the trait seams that every backend
//! (generative, embedding, retrieval) is consumed through.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Test allows"
    )
)]

/// Service configuration loaded from TOML and the environment.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Poison-tolerant lock helpers.
pub mod sync;
/// Text normalization shared by the intent matcher and in-memory search.
pub mod text;
/// Trait definitions for generative and embedding backends.
pub mod traits;
/// Core data types for intents, documents, prompts and answers.
pub mod types;

pub use config::ServiceConfig;
pub use error::{Error, Result, Stage};
pub use sync::{IgnoreLock, IgnoreRwLock};
pub use traits::{EmbeddingProvider, LocalEmbedder, ModelProvider};
pub use types::{
    AnswerMode, AnswerResult, Context, DangerLevel, Intent, IntentType, Query, Response,
    ScoredDocument, TokenUsage,
};
