use std::env;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use serpens_core::{Context, Error, ModelProvider, Query, Response, Result, TokenUsage};

/// `OpenRouter` API endpoint URL.
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
/// Default model for `OpenRouter`.
const DEFAULT_MODEL: &str = "google/gemini-2.5-flash-lite";
/// Env var key for `OpenRouter` API key.
const ENV_OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
/// Completion budget per call; answers are a few paragraphs at most.
const MAX_TOKENS: u32 = 1024;

/// Provider implementation for `OpenRouter` API.
pub struct OpenRouterProvider {
    /// HTTP client for API requests.
    client: Client,
    /// `OpenRouter` API key.
    api_key: String,
    /// Model name to use.
    model: String,
    /// `HTTP-Referer` attribution header.
    site_url: String,
    /// `X-Title` attribution header.
    site_name: String,
}

impl OpenRouterProvider {
    /// Creates a new `OpenRouterProvider` with the given API key.
    ///
    /// # Errors
    /// Returns an error if the provided API key is empty.
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::MissingApiKey(ENV_OPENROUTER_API_KEY.to_owned()));
        }

        Ok(Self {
            client: Client::default(),
            api_key,
            model: DEFAULT_MODEL.to_owned(),
            site_url: "http://localhost:3000".to_owned(),
            site_name: "SnakeRAG".to_owned(),
        })
    }

    /// Creates a new `OpenRouterProvider` from config or environment.
    ///
    /// # Errors
    /// Returns an error if the API key is not provided.
    pub fn from_config_or_env(config_key: Option<String>) -> Result<Self> {
        let api_key = config_key
            .or_else(|| env::var(ENV_OPENROUTER_API_KEY).ok())
            .ok_or_else(|| {
                Error::MissingApiKey(format!(
                    "{ENV_OPENROUTER_API_KEY} or config.toml openrouter_api_key"
                ))
            })?;
        Self::new(api_key)
    }

    /// Sets the model to use for generation.
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Sets the attribution headers `OpenRouter` shows in its rankings.
    #[must_use]
    pub fn with_attribution(mut self, site_url: String, site_name: String) -> Self {
        self.site_url = site_url;
        self.site_name = site_name;
        self
    }

    /// Builds messages from context and query for the `OpenRouter` API.
    fn build_messages(context: &Context, query: &Query) -> Vec<Value> {
        let mut messages = vec![json!({
            "role": "system",
            "content": context.system_prompt
        })];

        if !context.passages.is_empty() {
            messages.push(json!({
                "role": "user",
                "content": format!("[CONTEXT]:\n{}", context.passages_to_string())
            }));
        }

        messages.push(json!({
            "role": "user",
            "content": query.text
        }));

        messages
    }

    /// Full request body for one chat completion.
    fn build_request_body(&self, context: &Context, query: &Query) -> Value {
        let mut body = Map::new();
        body.insert("model".to_owned(), json!(self.model));
        body.insert(
            "messages".to_owned(),
            Value::Array(Self::build_messages(context, query)),
        );
        body.insert("max_tokens".to_owned(), json!(MAX_TOKENS));
        body.insert("temperature".to_owned(), json!(0));
        if query.json_output {
            body.insert(
                "response_format".to_owned(),
                json!({"type": "json_object"}),
            );
        }
        Value::Object(body)
    }
}

/// Response payload returned by the `OpenRouter` API.
#[derive(Deserialize)]
struct OpenRouterResponse {
    /// List of generated choices.
    choices: Vec<Choice>,
    /// Optional token usage statistics returned by the service.
    usage: Option<Usage>,
}

/// Individual completion choice from `OpenRouter`.
#[derive(Deserialize)]
struct Choice {
    /// Message payload representing the completion text.
    message: Message,
}

/// Message structure containing generated content.
#[derive(Deserialize)]
struct Message {
    /// Text content produced by the model; some models return `null`.
    content: Option<String>,
}

/// Token accounting information for a response.
#[derive(Deserialize)]
struct Usage {
    /// Number of prompt tokens billed for the request.
    prompt_tokens: u64,
    /// Number of completion tokens returned by the model.
    completion_tokens: u64,
    #[serde(default)]
    /// Detailed prompt token usage, when available.
    prompt_tokens_details: Option<PromptTokensDetails>,
}

/// Detailed prompt token usage breakdown.
#[derive(Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    /// Count of cached tokens supplied via the API.
    cached_tokens: u64,
}

#[async_trait]
impl ModelProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, query: &Query, context: &Context) -> Result<Response> {
        let start = Instant::now();
        let request_body = self.build_request_body(context, query);

        let response = self
            .client
            .post(OPENROUTER_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", &self.site_name)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| Error::Provider(format!("Request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "OpenRouter API request failed with status {status}: {error_text}"
            )));
        }

        let api_response: OpenRouterResponse = response
            .json()
            .await
            .map_err(|err| Error::InvalidResponse(format!("Failed to parse response: {err}")))?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::InvalidResponse("No response from OpenRouter".to_owned()))?;

        let tokens_used = api_response.usage.map_or_else(TokenUsage::default, |usage| {
            let cache_read = usage
                .prompt_tokens_details
                .as_ref()
                .map_or(0, |details| details.cached_tokens);

            TokenUsage {
                input: usage.prompt_tokens.saturating_sub(cache_read),
                output: usage.completion_tokens,
                cache_read,
            }
        });

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(
            model = %self.model,
            latency_ms,
            tokens = tokens_used.total(),
            "openrouter completion"
        );

        Ok(Response {
            text,
            tokens_used,
            provider: self.name().to_owned(),
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that creating a provider with an empty API key returns an error.
    #[test]
    fn test_new_with_empty_api_key() {
        let result = OpenRouterProvider::new(String::new());
        assert!(
            matches!(result, Err(Error::MissingApiKey(_))),
            "Empty API key should be a MissingApiKey error"
        );
    }

    /// Tests that `with_model` and `with_attribution` chain.
    #[test]
    fn test_builder_chaining() {
        let provider = OpenRouterProvider::new("test_key".to_owned())
            .unwrap()
            .with_model("custom-model".to_owned())
            .with_attribution("https://example.org".to_owned(), "Catalog".to_owned());
        assert_eq!(provider.model, "custom-model");
        assert_eq!(provider.api_key, "test_key");
        assert_eq!(provider.site_url, "https://example.org");
        assert_eq!(provider.site_name, "Catalog");
        assert_eq!(provider.name(), "openrouter");
    }

    /// Tests message building with passages and query.
    #[test]
    fn test_build_messages_with_passages() {
        let context = Context::new("answer in Vietnamese")
            .with_passages(vec!["Loài: Naja naja".to_owned(), "Loài: Naja kaouthia".to_owned()]);
        let query = Query::new("Rắn hổ mang sống ở đâu?");

        let messages = OpenRouterProvider::build_messages(&context, &query);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"].as_str(), Some("system"));
        let context_block = messages[1]["content"].as_str().unwrap();
        assert!(context_block.starts_with("[CONTEXT]:"));
        assert!(context_block.contains("Naja kaouthia"));
        assert_eq!(messages[2]["content"].as_str(), Some("Rắn hổ mang sống ở đâu?"));
    }

    /// Tests that a system-only context produces two messages.
    #[test]
    fn test_build_messages_without_passages() {
        let context = Context::new("extract intent");
        let query = Query::new("rắn độc");
        let messages = OpenRouterProvider::build_messages(&context, &query);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["role"].as_str(), Some("user"));
    }

    /// Tests that JSON output toggles the response format.
    #[test]
    fn test_request_body_response_format() {
        let provider = OpenRouterProvider::new("key".to_owned()).unwrap();
        let context = Context::new("system");

        let prose = provider.build_request_body(&context, &Query::new("q"));
        assert!(prose.get("response_format").is_none());
        assert_eq!(prose["temperature"], json!(0));

        let structured = provider.build_request_body(&context, &Query::new("q").expecting_json());
        assert_eq!(structured["response_format"]["type"], "json_object");
        assert_eq!(structured["model"], DEFAULT_MODEL);
    }
}
