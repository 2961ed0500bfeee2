//! In-process catalog backend.
//!
//! Scores with the same shape as the Elasticsearch script: cosine similarity
//! plus 1.0 plus weighted keyword relevance. A record that matches no keyword
//! clause scores exactly `cosine + 1.0`, as filter clauses add nothing in
//! Elasticsearch either.
//!
//! Keyword relevance is a coarse stand-in for BM25 on folded text. A `match`
//! field sums over its terms found in the question, damped by the field
//! length, so a question naming a species in full lifts that record the
//! most. A phrase field only fires when the field contains the whole
//! question, like `match_phrase`.

use std::cmp::Ordering;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use serpens_core::text::fold;
use serpens_core::{DangerLevel, IgnoreRwLock as _, Result, ScoredDocument};

use crate::backend::SearchBackend;
use crate::fields;
use crate::query::{KeywordQuery, Predicate, RetrievalQuery};

/// Keyword relevance of a whole-phrase hit, before the field boost.
const PHRASE_SCORE: f32 = 5.0;

/// A catalog record with its embedding.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Stored fields; the score is overwritten per search.
    pub document: ScoredDocument,
    /// Other common names.
    pub common_names: Vec<String>,
    /// Normalized danger class.
    pub danger_class: Option<DangerLevel>,
    /// Embedding of the record's description.
    pub embedding: Vec<f32>,
}

impl CatalogEntry {
    /// Entry without common names or danger class.
    pub fn new(document: ScoredDocument, embedding: Vec<f32>) -> Self {
        Self {
            document,
            common_names: Vec::new(),
            danger_class: None,
            embedding,
        }
    }

    /// Attach common names.
    #[must_use]
    pub fn with_common_names(mut self, names: Vec<String>) -> Self {
        self.common_names = names;
        self
    }

    /// Attach the danger class.
    #[must_use]
    pub fn with_danger_class(mut self, danger: DangerLevel) -> Self {
        self.danger_class = Some(danger);
        self
    }

    fn field_text(&self, field: &str) -> String {
        let document = &self.document;
        match field {
            fields::SCIENTIFIC_NAME => document.scientific_name.clone(),
            fields::VIETNAMESE_NAME => document.local_name.clone(),
            fields::COMMON_NAMES => self.common_names.join(", "),
            fields::FAMILY => document.family.clone(),
            fields::DANGER_LEVEL => document.danger_level.clone(),
            fields::DANGER_CLASS => self
                .danger_class
                .map(|danger| danger.as_keyword().to_owned())
                .unwrap_or_default(),
            fields::DISTRIBUTION => document.country.clone(),
            fields::BIOLOGY => document.biology_text.clone(),
            fields::VENOM => document.venom_text.clone(),
            _ => String::new(),
        }
    }

    fn satisfies(&self, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Match { field, value } => {
                let needle = fold(value);
                !needle.is_empty() && contains_phrase(&fold(&self.field_text(field)), &needle)
            }
            Predicate::Term { field, value } => self.field_text(field).eq_ignore_ascii_case(value),
        }
    }

    fn keyword_score(&self, keyword: &KeywordQuery) -> f32 {
        let question = fold(&keyword.text);
        if question.is_empty() {
            return 0.0;
        }
        let question_terms: Vec<&str> = question.split_whitespace().collect();

        keyword
            .fields
            .iter()
            .map(|field| {
                let value = fold(&self.field_text(field.field));
                if value.is_empty() {
                    return 0.0;
                }
                if field.phrase {
                    return if contains_phrase(&value, &question) {
                        field.boost * PHRASE_SCORE
                    } else {
                        0.0
                    };
                }
                let value_terms: Vec<&str> = value.split_whitespace().collect();
                let matched = value_terms
                    .iter()
                    .filter(|term| question_terms.contains(term))
                    .count() as f32;
                field.boost * matched * matched / value_terms.len() as f32
            })
            .sum()
    }
}

/// Whole-word containment on folded text.
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    format!(" {haystack} ").contains(&format!(" {needle} "))
}

/// Calculate cosine similarity between two vectors
fn cosine_similarity(vector_a: &[f32], vector_b: &[f32]) -> f32 {
    if vector_a.len() != vector_b.len() {
        return 0.0;
    }

    let dot_product: f32 = vector_a
        .iter()
        .zip(vector_b.iter())
        .map(|(left, right)| left * right)
        .sum();
    let magnitude_a = vector_a.iter().map(|value| value * value).sum::<f32>().sqrt();
    let magnitude_b = vector_b.iter().map(|value| value * value).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// In-memory catalog implementing [`SearchBackend`].
#[derive(Default)]
pub struct MemoryCatalog {
    entries: RwLock<Vec<CatalogEntry>>,
}

impl MemoryCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding `entries`.
    pub fn with_entries(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Add a record.
    pub fn insert(&self, entry: CatalogEntry) {
        self.entries.write_ignore_poison().push(entry);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.read_ignore_poison().len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SearchBackend for MemoryCatalog {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn search(&self, query: &RetrievalQuery) -> Result<Vec<ScoredDocument>> {
        let filters = query.filters();
        let keyword = query.keyword();

        let mut scored: Vec<ScoredDocument> = {
            let entries = self.entries.read_ignore_poison();
            entries
                .iter()
                .filter(|entry| {
                    filters.must.iter().all(|predicate| entry.satisfies(predicate))
                        && !filters.must_not.iter().any(|predicate| entry.satisfies(predicate))
                })
                .map(|entry| {
                    let vector_score = cosine_similarity(query.vector(), &entry.embedding);
                    let keyword_score = keyword.weight * entry.keyword_score(keyword);
                    let score = vector_score + 1.0 + keyword_score;
                    ScoredDocument {
                        score,
                        ..entry.document.clone()
                    }
                })
                .collect()
        };

        scored.sort_by(|first, second| {
            second
                .score
                .partial_cmp(&first.score)
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(query.limit());
        debug!(hits = scored.len(), "memory catalog search");
        Ok(scored)
    }
}
