//! Answer synthesis.
//!
//! The answer mode is decided here and only here: no hits gives a fixed
//! apology, a multi-hit listing is enumerated deterministically, and anything
//! else goes to the summarizer with an offline formatter behind it.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use serpens_core::config::PipelineConfig;
use serpens_core::text::{fold, truncate_chars};
use serpens_core::{
    AnswerMode, AnswerResult, Context, Intent, IntentType, ModelProvider, Query, ScoredDocument,
};

use crate::generation::GenerationPolicy;

/// Answer when nothing relevant was retrieved.
pub const NOT_FOUND_MESSAGE: &str =
    "Xin lỗi, tôi không tìm thấy thông tin phù hợp trong cơ sở dữ liệu.";
/// First line of an offline answer.
pub const FALLBACK_HEADER: &str =
    "Hệ thống AI đang bị quá tải. Dưới đây là thông tin thô tìm được từ cơ sở dữ liệu:";
/// Note attached to offline answers.
pub const FALLBACK_NOTE: &str = "AI provider unavailable";

const SUMMARY_PROMPT: &str = "You are a herpetology assistant. Based only on the context, \
answer the user's question in VIETNAMESE. If the context implies the snake is dangerous, \
emphasize it. If the context does not contain the answer, say so.";

/// Most hits ever placed in the summarizer context.
const MAX_CONTEXT_HITS: usize = 3;

/// Glyph for a free-text danger description.
pub fn danger_glyph(danger: &str) -> &'static str {
    let folded = fold(danger);
    let has = |markers: &[&str]| markers.iter().any(|marker| folded.contains(marker));

    if has(&["harmless", "non venomous", "nonvenomous", "vo hai", "khong doc"]) {
        "🟢"
    } else if has(&["fatal", "deadly", "lethal", "chet"]) {
        "☠️"
    } else if has(&["venom", "toxic", "poison", "danger", "doc", "nguy hiem"]) {
        "⚠️"
    } else {
        "❔"
    }
}

/// Builds the final [`AnswerResult`] for a request.
pub struct AnswerSynthesizer {
    provider: Arc<dyn ModelProvider>,
    policy: GenerationPolicy,
    context_hits: usize,
    excerpt_chars: usize,
    max_context_chars: usize,
}

impl AnswerSynthesizer {
    /// Synthesizer summarizing through `provider`.
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        policy: GenerationPolicy,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            provider,
            policy,
            context_hits: config.context_hits.clamp(1, MAX_CONTEXT_HITS),
            excerpt_chars: config.excerpt_chars,
            max_context_chars: config.max_context_chars,
        }
    }

    /// Answer `question` from the filtered `hits`.
    pub async fn synthesize(
        &self,
        question: &str,
        intent: &Intent,
        hits: &[ScoredDocument],
        started: Instant,
    ) -> AnswerResult {
        if hits.is_empty() {
            info!(mode = "no_result", "answer ready");
            return AnswerResult {
                answer_text: NOT_FOUND_MESSAGE.to_owned(),
                source_names: BTreeSet::new(),
                mode: AnswerMode::NoResult,
                latency: started.elapsed(),
                note: None,
            };
        }

        if intent.intent_type() == IntentType::Listing && hits.len() > 1 {
            info!(mode = "listing", count = hits.len(), "answer ready");
            return AnswerResult {
                answer_text: format_listing(hits),
                source_names: source_names(hits),
                mode: AnswerMode::Listing,
                latency: started.elapsed(),
                note: None,
            };
        }

        let top = &hits[..hits.len().min(self.context_hits)];
        let context = Context::new(SUMMARY_PROMPT).with_passages(self.context_passages(top));
        let query = Query::new(format!("[QUESTION]:\n{}", question.trim()));

        match self.policy.generate(self.provider.as_ref(), &query, &context).await {
            Ok(text) => {
                info!(mode = "ai_expert", sources = top.len(), "answer ready");
                AnswerResult {
                    answer_text: text.trim().to_owned(),
                    source_names: source_names(top),
                    mode: AnswerMode::AiExpert,
                    latency: started.elapsed(),
                    note: None,
                }
            }
            Err(failure) => {
                warn!(%failure, "summarizer unavailable, formatting offline answer");
                AnswerResult {
                    answer_text: self.format_offline(top),
                    source_names: source_names(top),
                    mode: AnswerMode::FallbackOffline,
                    latency: started.elapsed(),
                    note: Some(FALLBACK_NOTE.to_owned()),
                }
            }
        }
    }

    /// One passage per hit, stopping once the character budget is spent.
    fn context_passages(&self, hits: &[ScoredDocument]) -> Vec<String> {
        let mut passages = Vec::with_capacity(hits.len());
        let mut used = 0;
        for hit in hits {
            let passage = self.describe(hit);
            let length = passage.chars().count();
            if used + length > self.max_context_chars {
                if passages.is_empty() {
                    passages.push(truncate_chars(&passage, self.max_context_chars));
                }
                break;
            }
            used += length;
            passages.push(passage);
        }
        passages
    }

    fn describe(&self, hit: &ScoredDocument) -> String {
        let mut passage = format!("Species: {}.", hit.scientific_name);
        let mut field = |label: &str, value: &str| {
            if !value.trim().is_empty() {
                passage.push_str(&format!(" {label}: {}.", value.trim().trim_end_matches('.')));
            }
        };
        field("Vietnamese name", &hit.local_name);
        field("Family", &hit.family);
        field("Danger level", &hit.danger_level);
        field("Distribution", &hit.country);
        field("Venom", &hit.venom_text);
        field("Info", &truncate_chars(&hit.biology_text, self.excerpt_chars));
        if let Some(length) = hit.max_length_cm {
            passage.push_str(&format!(" Max length: {length} cm."));
        }
        passage
    }

    /// Plain-text answer built from the hits alone.
    fn format_offline(&self, hits: &[ScoredDocument]) -> String {
        let mut answer = String::from(FALLBACK_HEADER);
        for hit in hits {
            answer.push_str(&format!(
                "\n\n{} {} ({})",
                danger_glyph(&hit.danger_level),
                hit.display_name(),
                hit.scientific_name
            ));
            let mut line = |label: &str, value: &str| {
                if !value.trim().is_empty() {
                    answer.push_str(&format!("\n- {label}: {}", value.trim()));
                }
            };
            line("Họ", &hit.family);
            line("Mức độ nguy hiểm", &hit.danger_level);
            if let Some(length) = hit.max_length_cm {
                line("Kích thước tối đa", &format!("{length} cm"));
            }
            line("Phân bố", &hit.country);
            line("Đặc điểm", &truncate_chars(&hit.biology_text, self.excerpt_chars));
        }
        answer
    }
}

fn format_listing(hits: &[ScoredDocument]) -> String {
    let mut answer = format!("Tìm thấy {} loài phù hợp:", hits.len());
    for (index, hit) in hits.iter().enumerate() {
        answer.push_str(&format!(
            "\n{}. {} ({})",
            index + 1,
            hit.display_name(),
            hit.scientific_name
        ));
        if !hit.danger_level.trim().is_empty() {
            answer.push_str(&format!(" - {}", hit.danger_level.trim()));
        }
    }
    answer
}

fn source_names(hits: &[ScoredDocument]) -> BTreeSet<String> {
    hits.iter().map(|hit| hit.scientific_name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serpens_core::Stage;
    use serpens_providers::MockProvider;

    fn hit(scientific: &str, local: &str, danger: &str) -> ScoredDocument {
        ScoredDocument {
            scientific_name: scientific.to_owned(),
            local_name: local.to_owned(),
            family: "Elapidae".to_owned(),
            danger_level: danger.to_owned(),
            country: "Vietnam".to_owned(),
            biology_text: "Thân dài, màu đen với các khoanh trắng.".to_owned(),
            score: 1.5,
            ..ScoredDocument::default()
        }
    }

    fn synthesizer(provider: &MockProvider) -> AnswerSynthesizer {
        AnswerSynthesizer::new(
            Arc::new(provider.clone()),
            GenerationPolicy::new(Stage::Summarize, Duration::from_millis(200), 1),
            &PipelineConfig::default(),
        )
    }

    #[test]
    fn test_danger_glyphs() {
        assert_eq!(danger_glyph("Harmless"), "🟢");
        assert_eq!(danger_glyph("Potentially fatal bite"), "☠️");
        assert_eq!(danger_glyph("Venomous"), "⚠️");
        assert_eq!(danger_glyph("Rất nguy hiểm"), "⚠️");
        assert_eq!(danger_glyph(""), "❔");
    }

    #[tokio::test]
    async fn test_no_hits_is_no_result() {
        let provider = MockProvider::new("summary");
        let answer = synthesizer(&provider)
            .synthesize("q", &Intent::default(), &[], Instant::now())
            .await;
        assert_eq!(answer.mode, AnswerMode::NoResult);
        assert_eq!(answer.answer_text, NOT_FOUND_MESSAGE);
        assert!(answer.source_names.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_listing_is_deterministic() {
        let provider = MockProvider::new("summary");
        let hits = vec![
            hit("Bungarus fasciatus", "Rắn cạp nong", "Venomous"),
            hit("Naja kaouthia", "", "Venomous"),
        ];
        let intent = Intent::default().with_type(IntentType::Listing);
        let answer = synthesizer(&provider)
            .synthesize("liệt kê", &intent, &hits, Instant::now())
            .await;

        assert_eq!(answer.mode, AnswerMode::Listing);
        assert_eq!(
            answer.answer_text,
            "Tìm thấy 2 loài phù hợp:\n\
             1. Rắn cạp nong (Bungarus fasciatus) - Venomous\n\
             2. Naja kaouthia (Naja kaouthia) - Venomous"
        );
        assert_eq!(answer.source_names.len(), 2);
        assert_eq!(provider.call_count(), 0, "Listing never calls the summarizer");
    }

    #[tokio::test]
    async fn test_single_hit_listing_goes_to_summarizer() {
        let provider = MockProvider::new("summary").with_default_response("Rắn cạp nong rất độc.");
        let intent = Intent::default().with_type(IntentType::Listing);
        let hits = [hit("Bungarus fasciatus", "Rắn cạp nong", "Venomous")];
        let answer = synthesizer(&provider)
            .synthesize("liệt kê", &intent, &hits, Instant::now())
            .await;
        assert_eq!(answer.mode, AnswerMode::AiExpert);
        assert_eq!(answer.answer_text, "Rắn cạp nong rất độc.");
        assert!(answer.note.is_none());
    }

    #[tokio::test]
    async fn test_summarizer_sees_at_most_three_hits() {
        let provider = MockProvider::new("summary").with_default_response("ok");
        let hits: Vec<ScoredDocument> = (0..5)
            .map(|index| hit(&format!("Species {index}"), "", "Venomous"))
            .collect();
        let answer = synthesizer(&provider)
            .synthesize("rắn gì?", &Intent::default(), &hits, Instant::now())
            .await;
        assert_eq!(answer.mode, AnswerMode::AiExpert);
        assert_eq!(
            answer.source_names,
            BTreeSet::from(["Species 0".to_owned(), "Species 1".to_owned(), "Species 2".to_owned()])
        );
    }

    #[tokio::test]
    async fn test_failure_formats_offline_answer() {
        let provider = MockProvider::new("summary").with_failure();
        let hits = vec![
            hit("Bungarus fasciatus", "Rắn cạp nong", "Venomous"),
            hit("Ptyas korros", "Rắn ráo", "Harmless"),
        ];
        let answer = synthesizer(&provider)
            .synthesize("rắn nào?", &Intent::default(), &hits, Instant::now())
            .await;

        assert_eq!(answer.mode, AnswerMode::FallbackOffline);
        assert_eq!(answer.note.as_deref(), Some(FALLBACK_NOTE));
        assert!(answer.answer_text.starts_with(FALLBACK_HEADER));
        assert!(answer.answer_text.contains("⚠️ Rắn cạp nong (Bungarus fasciatus)"));
        assert!(answer.answer_text.contains("🟢 Rắn ráo (Ptyas korros)"));
        assert!(answer.answer_text.contains("- Họ: Elapidae"));
        assert_eq!(provider.call_count(), 2, "Exactly one attempt and one retry");
    }

    #[test]
    fn test_context_is_bounded() {
        let provider = MockProvider::new("summary");
        let config = PipelineConfig {
            max_context_chars: 60,
            ..PipelineConfig::default()
        };
        let synthesizer = AnswerSynthesizer::new(
            Arc::new(provider),
            GenerationPolicy::new(Stage::Summarize, Duration::from_millis(10), 0),
            &config,
        );
        let hits = vec![hit("A a", "", "Venomous"), hit("B b", "", "Venomous")];
        let passages = synthesizer.context_passages(&hits);
        assert_eq!(passages.len(), 1);
        assert!(passages[0].chars().count() <= 63);
    }
}
