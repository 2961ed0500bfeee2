use core::fmt::{Display, Formatter, Result as FmtResult};
use core::result::Result as CoreResult;
use std::io::Error as IoError;

use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Pipeline stage that talks to an external backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Generative intent extraction.
    IntentParse,
    /// Query embedding.
    Embedding,
    /// Hybrid search against the retrieval backend.
    Retrieval,
    /// Generative answer summarization.
    Summarize,
}

impl Display for Stage {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::IntentParse => "intent parse",
            Self::Embedding => "embedding",
            Self::Retrieval => "retrieval",
            Self::Summarize => "summarize",
        };
        formatter.write_str(label)
    }
}

/// Errors that can occur anywhere in the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// An HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generative provider encountered an error.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Required API key was not found.
    #[error("API key not found: {0}")]
    MissingApiKey(String),

    /// A backend returned a response that could not be interpreted.
    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    /// A backend call exceeded its time budget.
    #[error("{stage} timed out after {millis}ms")]
    Timeout {
        /// Stage whose call timed out.
        stage: Stage,
        /// Budget that was exceeded, in milliseconds.
        millis: u64,
    },

    /// The embedding backend failed; there is no safe default vector.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The retrieval backend failed; there is nothing to answer from.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// The question was rejected before entering the pipeline.
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error may succeed if retried.
    ///
    /// Returns `true` for transient errors like network failures, provider
    /// errors and timeouts.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::Provider(_) | Self::Timeout { .. }
        )
    }

    /// Whether the error came from a structural stage (embedding or retrieval)
    /// that has no degraded fallback.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_)
                | Self::Retrieval(_)
                | Self::Timeout {
                    stage: Stage::Embedding | Stage::Retrieval,
                    ..
                }
        )
    }
}
