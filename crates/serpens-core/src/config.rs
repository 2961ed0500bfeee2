//! Configuration for search, embedding, generation, caching and request limits.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs::home_dir;
use serde::{Deserialize, Serialize};
use toml::{from_str, to_string_pretty};
use tracing::debug;

use crate::{Error, Result};

/// Env var overriding the Elasticsearch URL.
const ENV_ES_HOST: &str = "ES_HOST";
/// Env var overriding the Ollama host.
const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";
/// Env var holding the `OpenRouter` API key.
const ENV_OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";

/// Complete service configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Retrieval backend settings
    pub search: SearchConfig,
    /// Embedding backend settings
    pub embedding: EmbeddingConfig,
    /// Generative backend settings
    pub generation: GenerationConfig,
    /// Intent and embedding cache settings
    pub cache: CacheConfig,
    /// Per-request limits
    pub pipeline: PipelineConfig,
    /// API keys for remote providers
    pub api_keys: ApiKeys,
}

/// API keys for remote providers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiKeys {
    /// `OpenRouter` API key
    pub openrouter_api_key: Option<String>,
}

/// Retrieval backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Elasticsearch base URL
    pub url: String,
    /// Index holding the catalog
    pub index: String,
    /// Minimum score a hit must exceed to be kept (scores carry a +1.0 shift)
    pub score_threshold: f32,
    /// Weight applied to the keyword relevance score before adding it to the vector score
    pub keyword_weight: f32,
    /// Timeout in milliseconds for one search call
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_owned(),
            index: "snakes".to_owned(),
            score_threshold: 1.1,
            keyword_weight: 0.1,
            timeout_ms: 5_000,
        }
    }
}

/// Embedding backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama host URL (without port)
    pub host: String,
    /// Ollama port
    pub port: u16,
    /// Embedding model name; must match the model used at indexing time
    pub model: String,
    /// Expected vector dimension; 0 disables the check
    pub dimensions: usize,
    /// Timeout in milliseconds for one embedding call
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".to_owned(),
            port: 11434,
            model: "bge-m3".to_owned(),
            dimensions: 1024,
            timeout_ms: 10_000,
        }
    }
}

/// Generative backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model routed through `OpenRouter`
    pub model: String,
    /// Timeout in milliseconds for intent extraction
    pub intent_timeout_ms: u64,
    /// Timeout in milliseconds for answer summarization
    pub summarize_timeout_ms: u64,
    /// Retries after a failed generative call (capped at 1)
    pub max_retries: u32,
    /// Value of the `HTTP-Referer` attribution header
    pub site_url: String,
    /// Value of the `X-Title` attribution header
    pub site_name: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "google/gemini-2.5-flash-lite".to_owned(),
            intent_timeout_ms: 4_000,
            summarize_timeout_ms: 15_000,
            max_retries: 1,
            site_url: "http://localhost:3000".to_owned(),
            site_name: "SnakeRAG".to_owned(),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum parsed intents kept
    pub intent_capacity: u64,
    /// Maximum query embeddings kept
    pub embedding_capacity: u64,
    /// Time-to-live for regular entries in seconds
    pub ttl_secs: u64,
    /// Time-to-live for entries produced by a transient failure, in seconds
    pub provisional_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            intent_capacity: 10_000,
            embedding_capacity: 10_000,
            ttl_secs: 24 * 3600,
            provisional_ttl_secs: 30,
        }
    }
}

impl CacheConfig {
    /// Regular entry lifetime.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Lifetime of provisional entries.
    pub fn provisional_ttl(&self) -> Duration {
        Duration::from_secs(self.provisional_ttl_secs)
    }
}

/// Per-request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Shortest accepted question, in characters after trimming
    pub min_question_chars: usize,
    /// Longest accepted question, in characters after trimming
    pub max_question_chars: usize,
    /// Hits used to build the summarizer context (at most 3)
    pub context_hits: usize,
    /// Characters of biology text kept per hit
    pub excerpt_chars: usize,
    /// Upper bound on the whole context block, in characters
    pub max_context_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_question_chars: 2,
            max_question_chars: 500,
            context_hits: 3,
            excerpt_chars: 300,
            max_context_chars: 4_000,
        }
    }
}

impl ServiceConfig {
    /// Get the default config directory path (`~/.serpens`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".serpens"))
    }

    /// Get the default config file path (`~/.serpens/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from `path`, creating it with defaults if it does not exist.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or created
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            let config = Self::default();
            config.save_to_file(path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read config: {error}")))?;
        let config: Self = from_str(&contents)?;

        debug!(
            "Loaded config from {:?}: index={}, openrouter_api_key={}",
            path,
            config.search.index,
            if config.api_keys.openrouter_api_key.is_some() {
                "present"
            } else {
                "missing"
            }
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!("Failed to create config directory: {error}"))
            })?;
        }

        let contents = to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Serpens Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))
            .map_err(|error| Error::Config(format!("Failed to write config: {error}")))?;

        Ok(())
    }

    /// Apply environment overrides (`ES_HOST`, `OLLAMA_HOST`).
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(env::var(ENV_ES_HOST).ok(), env::var(ENV_OLLAMA_HOST).ok())
    }

    /// Replace the search URL and embedding host when values are given.
    #[must_use]
    pub fn with_overrides(mut self, es_host: Option<String>, ollama_host: Option<String>) -> Self {
        if let Some(url) = es_host.filter(|url| !url.trim().is_empty()) {
            self.search.url = url;
        }
        if let Some(host) = ollama_host.filter(|host| !host.trim().is_empty()) {
            self.embedding.host = host;
        }
        self
    }

    /// `OpenRouter` API key, checking config first, then the environment.
    pub fn openrouter_api_key(&self) -> Option<String> {
        self.api_keys
            .openrouter_api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| env::var(ENV_OPENROUTER_API_KEY).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.search.index, "snakes");
        assert!((config.search.score_threshold - 1.1).abs() < f32::EPSILON);
        assert_eq!(config.embedding.dimensions, 1024);
        assert_eq!(config.generation.max_retries, 1);
        assert_eq!(config.pipeline.max_question_chars, 500);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_content = r#"
[search]
url = "http://es.internal:9200"
score_threshold = 1.25

[api_keys]
openrouter_api_key = "test_openrouter_key_456"
"#;

        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        temp_file
            .write_all(toml_content.as_bytes())
            .expect("Failed to write to temp file");

        let config = ServiceConfig::load_from_file(temp_file.path())
            .expect("Failed to load config from temp file");

        assert_eq!(config.search.url, "http://es.internal:9200");
        assert!((config.search.score_threshold - 1.25).abs() < f32::EPSILON);
        assert_eq!(config.search.index, "snakes");
        assert_eq!(config.embedding.model, "bge-m3");
        assert_eq!(
            config.openrouter_api_key(),
            Some("test_openrouter_key_456".to_owned())
        );
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("nested").join("config.toml");

        let created = ServiceConfig::load_or_create(&path).expect("create");
        assert!(path.exists());

        let reloaded = ServiceConfig::load_or_create(&path).expect("reload");
        assert_eq!(created.search.url, reloaded.search.url);
        assert_eq!(created.cache.intent_capacity, reloaded.cache.intent_capacity);

        let written = fs::read_to_string(&path).expect("read back");
        assert!(written.starts_with("# Serpens Configuration File"));
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        temp_file
            .write_all(b"[search\nurl = ")
            .expect("Failed to write to temp file");
        let result = ServiceConfig::load_from_file(temp_file.path());
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let config = ServiceConfig::default().with_overrides(
            Some("http://search:9200".to_owned()),
            Some("   ".to_owned()),
        );
        assert_eq!(config.search.url, "http://search:9200");
        assert_eq!(config.embedding.host, "http://localhost");
    }
}
