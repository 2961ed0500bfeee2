//! Intent extraction: cache, deterministic markers, then the generative model.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use serpens_core::types::DEFAULT_RESULT_LIMIT;
use serpens_core::{Context, DangerLevel, Intent, IntentType, ModelProvider, Query};

use crate::cache::{CacheKey, IntentCache};
use crate::generation::{GenerationFailure, GenerationPolicy};
use crate::markers::{self, MarkerText};

const INTENT_PROMPT: &str = "You extract search filters from questions about snakes. \
Questions are usually in Vietnamese. Reply with ONE JSON object and nothing else, with keys:\n\
- \"must_country\": English country name the snakes must live in, or null\n\
- \"must_not_country\": English country name to exclude, or null\n\
- \"danger_level\": \"venomous\", \"non_venomous\" or null\n\
- \"intent_type\": \"listing\" when the user wants several species enumerated, \
otherwise \"detail\"\n\
- \"result_limit\": how many species to return, 1 to 50 (default 5)\n\
Negations matter: \"không độc\" means non_venomous, \
\"trừ Việt Nam\" means must_not_country Vietnam.";

/// Why the generative path fell back to the default intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    /// The model did not answer in time.
    Timeout,
    /// The model call failed.
    Backend,
    /// The reply held no usable JSON object.
    Malformed,
}

/// Where a parsed intent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOrigin {
    /// Previously parsed.
    Cache,
    /// Keyword markers.
    FastPath,
    /// Generative model.
    Generative,
    /// Default intent after a failed generative call.
    Fallback(ParseFailure),
}

impl Display for IntentOrigin {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Cache => formatter.write_str("cache"),
            Self::FastPath => formatter.write_str("fast path"),
            Self::Generative => formatter.write_str("generative"),
            Self::Fallback(failure) => write!(formatter, "fallback ({failure:?})"),
        }
    }
}

/// Turns questions into [`Intent`]s. Never fails.
pub struct IntentParser {
    provider: Arc<dyn ModelProvider>,
    cache: IntentCache,
    policy: GenerationPolicy,
}

impl IntentParser {
    /// Parser backed by `provider`, storing results in `cache`.
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        cache: IntentCache,
        policy: GenerationPolicy,
    ) -> Self {
        Self {
            provider,
            cache,
            policy,
        }
    }

    /// Cache the parser writes to.
    pub fn cache(&self) -> &IntentCache {
        &self.cache
    }

    /// Intent for `question`, falling back to the default on any failure.
    pub async fn parse(&self, question: &str) -> Intent {
        self.parse_traced(question).await.0
    }

    /// Intent for `question` together with where it came from.
    pub async fn parse_traced(&self, question: &str) -> (Intent, IntentOrigin) {
        let key = CacheKey::of(question);
        if let Some(intent) = self.cache.get(&key) {
            debug!("intent cache hit");
            return (intent, IntentOrigin::Cache);
        }

        let text = MarkerText::new(question);
        if markers::has_negation(&text) {
            debug!("negation marker present, asking the model");
        } else {
            let intent = markers::fast_path(&text);
            debug!(?intent, "intent from markers");
            self.cache.insert(key, intent.clone());
            return (intent, IntentOrigin::FastPath);
        }

        let query = Query::new(question.trim()).expecting_json();
        let context = Context::new(INTENT_PROMPT);
        match self.policy.generate(self.provider.as_ref(), &query, &context).await {
            Ok(reply) => match interpret_reply(&reply) {
                Some(intent) => {
                    info!(?intent, "intent from model");
                    self.cache.insert(key, intent.clone());
                    (intent, IntentOrigin::Generative)
                }
                None => {
                    warn!(reply = %reply, "unreadable intent reply, using default");
                    self.cache.insert(key, Intent::default());
                    (Intent::default(), IntentOrigin::Fallback(ParseFailure::Malformed))
                }
            },
            Err(GenerationFailure::Empty) => {
                warn!("empty intent reply, using default");
                self.cache.insert(key, Intent::default());
                (Intent::default(), IntentOrigin::Fallback(ParseFailure::Malformed))
            }
            Err(failure) => {
                let reason = if matches!(failure, GenerationFailure::Timeout { .. }) {
                    ParseFailure::Timeout
                } else {
                    ParseFailure::Backend
                };
                warn!(%failure, "intent model unavailable, using default provisionally");
                self.cache.insert_provisional(key, Intent::default());
                (Intent::default(), IntentOrigin::Fallback(reason))
            }
        }
    }
}

/// Read an intent out of a model reply, or `None` if there is no JSON object.
///
/// Individual fields are validated leniently: unknown values fall back to the
/// default rather than rejecting the whole reply.
fn interpret_reply(reply: &str) -> Option<Intent> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    let object = match serde_json::from_str::<Value>(&reply[start..=end]).ok()? {
        Value::Object(object) => object,
        _ => return None,
    };

    let mut intent = Intent::default().with_limit(read_limit(object.get("result_limit")));

    if let Some(country) = read_country(&object, "must_country") {
        intent = intent.with_country(country);
    }
    if let Some(country) = read_country(&object, "must_not_country") {
        intent = intent.without_country(country);
    }
    if let Some(danger) = object.get("danger_level").and_then(Value::as_str).and_then(read_danger) {
        intent = intent.with_danger(danger);
    }
    let listing = object
        .get("intent_type")
        .and_then(Value::as_str)
        .is_some_and(|kind| matches!(kind.trim().to_lowercase().as_str(), "listing" | "list"));
    if listing {
        intent = intent.with_type(IntentType::Listing);
    }

    Some(intent)
}

fn read_limit(value: Option<&Value>) -> i64 {
    let default = i64::from(DEFAULT_RESULT_LIMIT);
    match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64))
            .unwrap_or(default),
        Some(Value::String(text)) => text
            .trim()
            .parse::<i64>()
            .or_else(|_| text.trim().parse::<f64>().map(|float| float as i64))
            .unwrap_or(default),
        _ => default,
    }
}

fn read_country(object: &Map<String, Value>, key: &str) -> Option<String> {
    let country = object.get(key)?.as_str()?.trim();
    let lowered = country.to_lowercase();
    if country.is_empty() || matches!(lowered.as_str(), "null" | "none" | "unknown") {
        None
    } else {
        Some(country.to_owned())
    }
}

fn read_danger(value: &str) -> Option<DangerLevel> {
    match value.trim().to_lowercase().as_str() {
        "venomous" | "dangerous" | "toxic" => Some(DangerLevel::Venomous),
        "non_venomous" | "non-venomous" | "nonvenomous" | "harmless" | "safe" => {
            Some(DangerLevel::NonVenomous)
        }
        _ => None,
    }
}
