//! Mock provider for exercising the pipeline without a generative backend.
//!
//! Canned responses are matched against the query text; failures and
//! latency can be scripted so degraded paths are reproducible.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use serpens_core::{
    Context, Error, IgnoreLock as _, ModelProvider, Query, Response, Result, TokenUsage,
};

/// Response storage type
type ResponseMap = Arc<Mutex<HashMap<String, String>>>;

/// Mock provider that returns pre-defined responses based on query patterns.
#[derive(Clone)]
pub struct MockProvider {
    /// Name reported in responses
    name: String,
    /// Predefined responses keyed by query pattern
    responses: ResponseMap,
    /// Default response if no pattern matches
    default_response: Arc<Mutex<Option<String>>>,
    /// Number of upcoming calls that fail with a provider error
    failures_remaining: Arc<AtomicUsize>,
    /// Artificial latency applied before answering
    delay: Option<Duration>,
    /// Call history for verification
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a new mock provider with a given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Arc::new(Mutex::new(HashMap::new())),
            default_response: Arc::new(Mutex::new(None)),
            failures_remaining: Arc::new(AtomicUsize::new(0)),
            delay: None,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a pattern-based response to the mock provider.
    #[must_use]
    pub fn with_response(self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        {
            let mut responses = self.responses.lock_ignore_poison();
            responses.insert(pattern.into(), response.into());
        }
        self
    }

    /// Set a default response for queries that don't match any pattern.
    #[must_use]
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        {
            let mut default = self.default_response.lock_ignore_poison();
            *default = Some(response.into());
        }
        self
    }

    /// Fail every call.
    #[must_use]
    pub fn with_failure(self) -> Self {
        self.with_failures(usize::MAX)
    }

    /// Fail the next `count` calls, then answer normally.
    #[must_use]
    pub fn with_failures(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Sleep for `delay` before every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Clear the call history.
    pub fn clear_history(&self) {
        let mut history = self.call_history.lock_ignore_poison();
        history.clear();
    }

    /// Get the call history (list of all queries made).
    #[must_use]
    pub fn get_call_history(&self) -> Vec<String> {
        let history = self.call_history.lock_ignore_poison();
        history.clone()
    }

    /// Get the number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        let history = self.call_history.lock_ignore_poison();
        history.len()
    }

    /// Consume one scripted failure, if any are left.
    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| match remaining {
                0 => None,
                usize::MAX => Some(usize::MAX),
                other => Some(other - 1),
            })
            .is_ok()
    }

    /// Find a matching response for the given query text.
    fn find_response(&self, query_text: &str) -> Option<String> {
        let responses = self.responses.lock_ignore_poison();

        if let Some(response) = responses.get(query_text) {
            return Some(response.clone());
        }

        // Longest pattern wins so overlapping patterns stay deterministic
        responses
            .iter()
            .filter(|(pattern, _)| query_text.contains(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, response)| response.clone())
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.failures_remaining.load(Ordering::SeqCst) == 0
    }

    async fn generate(&self, query: &Query, _context: &Context) -> Result<Response> {
        {
            let mut history = self.call_history.lock_ignore_poison();
            history.push(query.text.clone());
        }

        if let Some(delay) = self.delay {
            sleep(delay).await;
        }

        if self.take_failure() {
            return Err(Error::Provider(format!("{} is unavailable", self.name)));
        }

        let text = self.find_response(&query.text).unwrap_or_else(|| {
            let default = self.default_response.lock_ignore_poison();
            default
                .clone()
                .unwrap_or_else(|| format!("Mock response for query: {}", query.text))
        });

        Ok(Response {
            text,
            tokens_used: TokenUsage {
                input: query.text.len() as u64,
                output: 0,
                cache_read: 0,
            },
            provider: self.name.clone(),
            latency_ms: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests exact and substring pattern matching with a default fallback.
    #[tokio::test]
    async fn test_pattern_matching_and_default() {
        let provider = MockProvider::new("summarizer")
            .with_response("hổ mang", "Rắn hổ mang có nọc độc thần kinh.")
            .with_default_response("Không rõ.");
        let context = Context::new("system");

        let matched = provider
            .generate(&Query::new("Rắn hổ mang chúa sống ở đâu?"), &context)
            .await
            .expect("generate");
        assert_eq!(matched.text, "Rắn hổ mang có nọc độc thần kinh.");
        assert_eq!(matched.provider, "summarizer");

        let fallback = provider
            .generate(&Query::new("rắn lục"), &context)
            .await
            .expect("generate");
        assert_eq!(fallback.text, "Không rõ.");
        assert_eq!(provider.call_count(), 2);
    }

    /// Tests that scripted failures are consumed before normal answers resume.
    #[tokio::test]
    async fn test_failures_are_consumed() {
        let provider = MockProvider::new("flaky")
            .with_default_response("ok")
            .with_failures(1);
        let context = Context::new("system");

        let first = provider.generate(&Query::new("a"), &context).await;
        assert!(matches!(first, Err(Error::Provider(_))), "First call should fail");

        let second = provider.generate(&Query::new("b"), &context).await;
        assert_eq!(second.expect("second call succeeds").text, "ok");
        assert_eq!(provider.get_call_history(), vec!["a".to_owned(), "b".to_owned()]);
    }

    /// Tests that a permanently failing provider never recovers.
    #[tokio::test]
    async fn test_permanent_failure() {
        let provider = MockProvider::new("down").with_failure();
        assert!(!provider.is_available().await);
        let context = Context::new("system");
        for _ in 0..3 {
            let outcome = provider.generate(&Query::new("q"), &context).await;
            assert!(matches!(outcome, Err(Error::Provider(_))));
        }
        provider.clear_history();
        assert_eq!(provider.call_count(), 0);
    }

    /// Tests that the configured name is reported by the provider and its responses.
    #[tokio::test]
    async fn test_reports_configured_name() {
        let provider = MockProvider::new("intent-model").with_default_response("ok");
        assert_eq!(provider.name(), "intent-model");

        let response = provider
            .generate(&Query::new("q"), &Context::new("system"))
            .await
            .expect("default response");
        assert_eq!(response.provider, "intent-model");
    }

    /// Tests that clones share history.
    #[tokio::test]
    async fn test_clones_share_history() {
        let provider = MockProvider::new("shared");
        let clone = provider.clone();
        clone
            .generate(&Query::new("q"), &Context::new("s"))
            .await
            .expect("generate");
        assert_eq!(provider.call_count(), 1);
    }
}
