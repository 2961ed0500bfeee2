use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::warn;

use serpens_core::{Context, Error, ModelProvider, Query, Stage};

/// Why a generative call produced no usable text.
#[derive(Debug, Error)]
pub enum GenerationFailure {
    /// Every attempt exceeded the time budget.
    #[error("{stage} timed out after {millis}ms")]
    Timeout {
        /// Calling stage.
        stage: Stage,
        /// Budget per attempt, in milliseconds.
        millis: u64,
    },
    /// The provider returned an error.
    #[error("{0}")]
    Backend(Error),
    /// The provider answered with blank text.
    #[error("empty reply")]
    Empty,
}

/// Timeout and retry budget for one generative stage.
#[derive(Debug, Clone, Copy)]
pub struct GenerationPolicy {
    stage: Stage,
    timeout: Duration,
    max_retries: u32,
}

impl GenerationPolicy {
    /// Policy for `stage`; retries are capped at one.
    pub fn new(stage: Stage, timeout: Duration, max_retries: u32) -> Self {
        Self {
            stage,
            timeout,
            max_retries: max_retries.min(1),
        }
    }

    /// Retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `query` against `provider`, retrying once on a timeout or a
    /// retryable error.
    ///
    /// # Errors
    /// Returns the failure of the last attempt.
    pub async fn generate(
        &self,
        provider: &dyn ModelProvider,
        query: &Query,
        context: &Context,
    ) -> Result<String, GenerationFailure> {
        let millis = self.timeout.as_millis() as u64;
        let mut attempt = 0;
        loop {
            let failure = match timeout(self.timeout, provider.generate(query, context)).await {
                Ok(Ok(response)) if !response.text.trim().is_empty() => return Ok(response.text),
                Ok(Ok(_)) => return Err(GenerationFailure::Empty),
                Ok(Err(error)) if !error.is_retryable() => {
                    return Err(GenerationFailure::Backend(error));
                }
                Ok(Err(error)) => GenerationFailure::Backend(error),
                Err(_elapsed) => GenerationFailure::Timeout {
                    stage: self.stage,
                    millis,
                },
            };

            if attempt >= self.max_retries {
                return Err(failure);
            }
            attempt += 1;
            warn!(
                stage = %self.stage,
                provider = provider.name(),
                %failure,
                "generative call failed, retrying"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serpens_providers::MockProvider;

    fn policy(retries: u32) -> GenerationPolicy {
        GenerationPolicy::new(Stage::Summarize, Duration::from_millis(200), retries)
    }

    #[tokio::test]
    async fn test_success_returns_text() {
        let provider = MockProvider::new("ok").with_default_response("xin chào");
        let text = policy(1)
            .generate(&provider, &Query::new("q"), &Context::new("s"))
            .await
            .expect("generate");
        assert_eq!(text, "xin chào");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_are_capped_at_one() {
        let provider = MockProvider::new("down").with_failure();
        let result = policy(5)
            .generate(&provider, &Query::new("q"), &Context::new("s"))
            .await;
        assert!(matches!(result, Err(GenerationFailure::Backend(_))));
        assert_eq!(provider.call_count(), 2, "One attempt plus one retry");
    }

    #[tokio::test]
    async fn test_retry_recovers_from_one_failure() {
        let provider = MockProvider::new("flaky")
            .with_default_response("ok")
            .with_failures(1);
        let text = policy(1)
            .generate(&provider, &Query::new("q"), &Context::new("s"))
            .await
            .expect("second attempt succeeds");
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_timeout_without_retry() {
        let provider = MockProvider::new("slow")
            .with_default_response("late")
            .with_delay(Duration::from_millis(500));
        let result = GenerationPolicy::new(Stage::IntentParse, Duration::from_millis(20), 0)
            .generate(&provider, &Query::new("q"), &Context::new("s"))
            .await;
        assert!(matches!(
            result,
            Err(GenerationFailure::Timeout {
                stage: Stage::IntentParse,
                millis: 20
            })
        ));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_blank_reply_is_empty() {
        let provider = MockProvider::new("blank").with_default_response("   ");
        let result = policy(1)
            .generate(&provider, &Query::new("q"), &Context::new("s"))
            .await;
        assert!(matches!(result, Err(GenerationFailure::Empty)));
        assert_eq!(provider.call_count(), 1);
    }
}
