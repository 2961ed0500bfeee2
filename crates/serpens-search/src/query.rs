use serde::Serialize;

use serpens_core::config::SearchConfig;
use serpens_core::types::MAX_RESULT_LIMIT;
use serpens_core::Intent;

use crate::fields;

/// One keyword-searched field and its boost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeywordField {
    /// Index field name.
    pub field: &'static str,
    /// Relevance multiplier.
    pub boost: f32,
    /// Require the whole question as a phrase inside the field instead of
    /// scoring loose terms.
    pub phrase: bool,
}

/// Keyword fields, strongest first.
///
/// The Vietnamese name dominates. The phrase clause catches a question that is
/// just a name; the term clause lifts the record whose full name appears
/// inside a longer question, even when the embedding drifts elsewhere.
pub const KEYWORD_FIELDS: [KeywordField; 4] = [
    KeywordField {
        field: fields::VIETNAMESE_NAME,
        boost: 4.0,
        phrase: true,
    },
    KeywordField {
        field: fields::VIETNAMESE_NAME,
        boost: 3.0,
        phrase: false,
    },
    KeywordField {
        field: fields::SCIENTIFIC_NAME,
        boost: 1.5,
        phrase: false,
    },
    KeywordField {
        field: fields::COMMON_NAMES,
        boost: 1.0,
        phrase: false,
    },
];

/// Keyword half of a hybrid query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordQuery {
    /// Raw question text, trimmed.
    pub text: String,
    /// Fields searched, with boosts.
    pub fields: Vec<KeywordField>,
    /// Scale applied to the keyword score before adding it to the vector score.
    pub weight: f32,
}

/// Structured filter clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Analyzed full-text match.
    Match {
        /// Index field name.
        field: &'static str,
        /// Text that must match.
        value: String,
    },
    /// Exact keyword equality.
    Term {
        /// Index field name.
        field: &'static str,
        /// Keyword value.
        value: String,
    },
}

/// Hard filters: every `must` predicate holds, no `must_not` predicate holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filters {
    /// Predicates every hit satisfies.
    pub must: Vec<Predicate>,
    /// Predicates no hit satisfies.
    pub must_not: Vec<Predicate>,
}

/// Backend-neutral hybrid query. Built once per request and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalQuery {
    vector: Vec<f32>,
    keyword: KeywordQuery,
    filters: Filters,
    limit: usize,
}

impl RetrievalQuery {
    /// Query embedding.
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Keyword clause.
    pub fn keyword(&self) -> &KeywordQuery {
        &self.keyword
    }

    /// Hard filters.
    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Maximum hits to return, within `[1, 50]`.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Builds [`RetrievalQuery`] values from parsed intents.
#[derive(Debug, Clone, Copy)]
pub struct HybridQueryBuilder {
    keyword_weight: f32,
}

impl Default for HybridQueryBuilder {
    fn default() -> Self {
        Self { keyword_weight: 0.1 }
    }
}

impl HybridQueryBuilder {
    /// Builder with an explicit keyword weight.
    pub fn new(keyword_weight: f32) -> Self {
        Self { keyword_weight }
    }

    /// Builder using the configured keyword weight.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.keyword_weight)
    }

    /// Combine intent, embedding and question text into one query.
    pub fn build(&self, intent: &Intent, vector: Vec<f32>, raw_question: &str) -> RetrievalQuery {
        let mut filters = Filters::default();

        if let Some(country) = intent.must_country() {
            filters.must.push(Self::country(country));
        }
        if let Some(country) = intent.must_not_country() {
            filters.must_not.push(Self::country(country));
        }
        if let Some(danger) = intent.danger_level() {
            filters.must.push(Predicate::Term {
                field: fields::DANGER_CLASS,
                value: danger.as_keyword().to_owned(),
            });
        }

        RetrievalQuery {
            vector,
            keyword: KeywordQuery {
                text: raw_question.trim().to_owned(),
                fields: KEYWORD_FIELDS.to_vec(),
                weight: self.keyword_weight,
            },
            filters,
            limit: usize::from(intent.result_limit().min(MAX_RESULT_LIMIT)),
        }
    }

    fn country(country: &str) -> Predicate {
        Predicate::Match {
            field: fields::DISTRIBUTION,
            value: country.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serpens_core::{DangerLevel, IntentType};

    #[test]
    fn test_default_intent_has_no_filters() {
        let query =
            HybridQueryBuilder::default().build(&Intent::default(), vec![0.5; 4], " rắn ");
        assert!(query.filters().must.is_empty());
        assert!(query.filters().must_not.is_empty());
        assert_eq!(query.limit(), 5);
        assert_eq!(query.keyword().text, "rắn");
        assert_eq!(query.vector().len(), 4);
    }

    #[test]
    fn test_filters_follow_intent() {
        let intent = Intent::default()
            .with_country("Vietnam")
            .without_country("China")
            .with_danger(DangerLevel::NonVenomous)
            .with_type(IntentType::Listing)
            .with_limit(10);
        let query = HybridQueryBuilder::new(0.2).build(&intent, Vec::new(), "q");

        assert_eq!(
            query.filters().must,
            vec![
                Predicate::Match {
                    field: fields::DISTRIBUTION,
                    value: "Vietnam".to_owned()
                },
                Predicate::Term {
                    field: fields::DANGER_CLASS,
                    value: "non_venomous".to_owned()
                },
            ]
        );
        assert_eq!(
            query.filters().must_not,
            vec![Predicate::Match {
                field: fields::DISTRIBUTION,
                value: "China".to_owned()
            }]
        );
        assert_eq!(query.limit(), 10);
        assert!((query.keyword().weight - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_keyword_fields_strongest_first() {
        let query = HybridQueryBuilder::default().build(&Intent::default(), Vec::new(), "q");
        let boosts: Vec<f32> = query.keyword().fields.iter().map(|field| field.boost).collect();
        assert_eq!(boosts, vec![4.0, 3.0, 1.5, 1.0]);
        assert!(query.keyword().fields[0].phrase);
    }

    #[test]
    fn test_limit_never_exceeds_ceiling() {
        let intent = Intent::default().with_limit(500);
        let query = HybridQueryBuilder::default().build(&intent, Vec::new(), "q");
        assert_eq!(query.limit(), 50);
    }
}
