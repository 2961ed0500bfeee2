use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

/// Smallest result limit an intent may carry.
pub const MIN_RESULT_LIMIT: u8 = 1;
/// Hard system ceiling on results per request.
pub const MAX_RESULT_LIMIT: u8 = 50;
/// Result limit of the conservative default intent.
pub const DEFAULT_RESULT_LIMIT: u8 = 5;
/// Result limit the fast path assigns to listing questions.
pub const LISTING_RESULT_LIMIT: u8 = 10;

/// Shape of answer the question is asking for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    /// Information about one or a few species.
    #[default]
    Detail,
    /// An enumeration of matching species.
    Listing,
}

/// Danger filter extracted from a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerLevel {
    /// Venomous or otherwise dangerous species.
    Venomous,
    /// Harmless species.
    NonVenomous,
}

impl DangerLevel {
    /// Normalized keyword stored in the index's danger class field.
    pub fn as_keyword(self) -> &'static str {
        match self {
            Self::Venomous => "venomous",
            Self::NonVenomous => "non_venomous",
        }
    }
}

/// Structured reading of a question: filters plus response shape.
///
/// Fields are private so that the result limit clamp cannot be bypassed; build
/// one from [`Intent::default`] with the consuming `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Intent {
    must_country: Option<String>,
    must_not_country: Option<String>,
    danger_level: Option<DangerLevel>,
    intent_type: IntentType,
    result_limit: u8,
}

impl Default for Intent {
    fn default() -> Self {
        Self {
            must_country: None,
            must_not_country: None,
            danger_level: None,
            intent_type: IntentType::Detail,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

impl Intent {
    /// Clamp any integer into the valid result limit range.
    pub fn clamp_limit(limit: i64) -> u8 {
        limit.clamp(i64::from(MIN_RESULT_LIMIT), i64::from(MAX_RESULT_LIMIT)) as u8
    }

    /// Require results from this country.
    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.must_country = Some(country.into());
        self
    }

    /// Exclude results from this country.
    #[must_use]
    pub fn without_country(mut self, country: impl Into<String>) -> Self {
        self.must_not_country = Some(country.into());
        self
    }

    /// Restrict by danger level.
    #[must_use]
    pub fn with_danger(mut self, danger: DangerLevel) -> Self {
        self.danger_level = Some(danger);
        self
    }

    /// Set the response shape.
    #[must_use]
    pub fn with_type(mut self, intent_type: IntentType) -> Self {
        self.intent_type = intent_type;
        self
    }

    /// Set the result limit, clamped to `[1, 50]`.
    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.result_limit = Self::clamp_limit(limit);
        self
    }

    /// Country every result must come from.
    pub fn must_country(&self) -> Option<&str> {
        self.must_country.as_deref()
    }

    /// Country no result may come from.
    pub fn must_not_country(&self) -> Option<&str> {
        self.must_not_country.as_deref()
    }

    /// Danger filter, if any.
    pub fn danger_level(&self) -> Option<DangerLevel> {
        self.danger_level
    }

    /// Requested response shape.
    pub fn intent_type(&self) -> IntentType {
        self.intent_type
    }

    /// Number of results to retrieve, always within `[1, 50]`.
    pub fn result_limit(&self) -> u8 {
        self.result_limit
    }
}

/// A catalog entry returned by the retrieval backend, with its relevance score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// Document identifier in the index.
    pub id: String,
    /// Binomial or trinomial name.
    pub scientific_name: String,
    /// Vietnamese common name, empty when unknown.
    pub local_name: String,
    /// Taxonomic family.
    pub family: String,
    /// Free-text danger description from the source data.
    pub danger_level: String,
    /// Distribution / country text.
    pub country: String,
    /// Appearance and biology description.
    pub biology_text: String,
    /// Venom description.
    pub venom_text: String,
    /// Maximum recorded length in centimetres.
    pub max_length_cm: Option<f32>,
    /// Backend-assigned relevance score.
    pub score: f32,
}

impl ScoredDocument {
    /// Name shown to users: the local name when present, else the scientific one.
    pub fn display_name(&self) -> &str {
        if self.local_name.trim().is_empty() {
            &self.scientific_name
        } else {
            &self.local_name
        }
    }
}

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    /// Generated by the summarizer from retrieved context.
    AiExpert,
    /// Deterministic enumeration of matching species.
    Listing,
    /// Nothing relevant was retrieved.
    NoResult,
    /// Deterministic formatter used because the summarizer was unavailable.
    FallbackOffline,
}

/// The terminal artifact of one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResult {
    /// User-facing answer.
    #[serde(rename = "answer")]
    pub answer_text: String,
    /// Scientific names of the species the answer draws on.
    #[serde(rename = "sources")]
    pub source_names: BTreeSet<String>,
    /// Which branch produced the answer.
    pub mode: AnswerMode,
    /// Wall-clock time from request start to answer.
    #[serde(rename = "time_taken", serialize_with = "serialize_latency")]
    pub latency: Duration,
    /// Why the answer is degraded, when it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Render latency as seconds with two decimals, e.g. `"0.42s"`.
fn serialize_latency<S: Serializer>(latency: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.2}s", latency.as_secs_f64()))
}

/// A prompt sent to a generative provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// User message text.
    pub text: String,
    /// Ask the provider for a JSON object instead of prose.
    pub json_output: bool,
}

impl Query {
    /// Free-text query.
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self {
            text: text.into(),
            json_output: false,
        }
    }

    /// Request structured JSON output.
    #[must_use]
    pub fn expecting_json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// System instructions plus reference passages for a generative call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// System prompt.
    pub system_prompt: String,
    /// Reference passages placed before the question.
    pub passages: Vec<String>,
}

impl Context {
    /// Context with only a system prompt.
    pub fn new<T: Into<String>>(system_prompt: T) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            passages: Vec::new(),
        }
    }

    /// Attach reference passages.
    #[must_use]
    pub fn with_passages(mut self, passages: Vec<String>) -> Self {
        self.passages = passages;
        self
    }

    /// Passages joined into one block, blank line separated.
    #[must_use]
    pub fn passages_to_string(&self) -> String {
        self.passages.join("\n\n")
    }
}

/// Generated text plus accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Generated text.
    pub text: String,
    /// Token accounting, when the provider reports it.
    pub tokens_used: TokenUsage,
    /// Provider identifier.
    pub provider: String,
    /// Provider-side latency in milliseconds.
    pub latency_ms: u64,
}

/// Token accounting for one generative call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input: u64,
    /// Completion tokens.
    pub output: u64,
    /// Prompt tokens served from the provider cache.
    pub cache_read: u64,
}

impl TokenUsage {
    /// Total tokens billed.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.input + self.output + self.cache_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn test_intent_default_is_conservative() {
        let intent = Intent::default();
        assert_eq!(intent.intent_type(), IntentType::Detail);
        assert_eq!(intent.result_limit(), DEFAULT_RESULT_LIMIT);
        assert!(intent.must_country().is_none());
        assert!(intent.must_not_country().is_none());
        assert!(intent.danger_level().is_none());
    }

    #[test]
    fn test_intent_limit_is_clamped() {
        assert_eq!(Intent::default().with_limit(0).result_limit(), 1);
        assert_eq!(Intent::default().with_limit(-7).result_limit(), 1);
        assert_eq!(Intent::default().with_limit(999).result_limit(), 50);
        assert_eq!(Intent::default().with_limit(12).result_limit(), 12);
    }

    #[test]
    fn test_display_name_prefers_local_name() {
        let mut document = ScoredDocument {
            scientific_name: "Ophiophagus hannah".to_owned(),
            ..ScoredDocument::default()
        };
        assert_eq!(document.display_name(), "Ophiophagus hannah");
        document.local_name = "Rắn hổ mang chúa".to_owned();
        assert_eq!(document.display_name(), "Rắn hổ mang chúa");
    }

    #[test]
    fn test_answer_result_wire_shape() {
        let answer = AnswerResult {
            answer_text: "ok".to_owned(),
            source_names: BTreeSet::from(["Naja naja".to_owned()]),
            mode: AnswerMode::FallbackOffline,
            latency: Duration::from_millis(1234),
            note: Some("AI provider unavailable".to_owned()),
        };
        let value = to_value(&answer).unwrap();
        assert_eq!(
            value,
            json!({
                "answer": "ok",
                "sources": ["Naja naja"],
                "mode": "fallback_offline",
                "time_taken": "1.23s",
                "note": "AI provider unavailable"
            })
        );
    }

    #[test]
    fn test_note_omitted_when_absent() {
        let answer = AnswerResult {
            answer_text: String::new(),
            source_names: BTreeSet::new(),
            mode: AnswerMode::NoResult,
            latency: Duration::ZERO,
            note: None,
        };
        let value = to_value(&answer).unwrap();
        assert!(value.get("note").is_none());
        assert_eq!(value["mode"], "no_result");
    }
}
