//! Elasticsearch backend.
//!
//! A hybrid query becomes a single `script_score` request. The inner `bool`
//! holds the hard filters in filter context, where they add nothing to
//! `_score`, so `_score` is keyword relevance alone and is zero for a
//! document no keyword clause matches. The script adds cosine similarity
//! against the stored embedding.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use serpens_core::config::SearchConfig;
use serpens_core::{Error, Result, ScoredDocument};

use crate::backend::SearchBackend;
use crate::fields;
use crate::query::{KeywordQuery, Predicate, RetrievalQuery};

/// Cosine similarity shifted by 1.0 to stay non-negative, plus weighted keyword relevance.
const SCORE_SCRIPT: &str = concat!(
    "cosineSimilarity(params.query_vector, 'vector_embedding') + 1.0",
    " + params.keyword_weight * _score"
);

/// Retrieval backend talking to Elasticsearch over HTTP.
pub struct ElasticsearchBackend {
    client: Client,
    url: String,
    index: String,
}

impl ElasticsearchBackend {
    /// Backend for `index` on the cluster at `url`.
    pub fn new(url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            url: url.into().trim_end_matches('/').to_owned(),
            index: index.into(),
        }
    }

    /// Backend from the search section of the service config.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.url.clone(), config.index.clone())
    }

    /// Render the request body for `query`.
    pub fn request_body(query: &RetrievalQuery) -> Value {
        let filters = query.filters();
        let mut filter = vec![json!({"match_all": {}})];
        filter.extend(filters.must.iter().map(render_predicate));
        let must_not: Vec<Value> = filters.must_not.iter().map(render_predicate).collect();
        json!({
            "size": query.limit(),
            "query": {
                "script_score": {
                    "query": {
                        "bool": {
                            "filter": filter,
                            "must_not": must_not,
                            "should": render_keyword(query.keyword()),
                            "minimum_should_match": 0
                        }
                    },
                    "script": {
                        "source": SCORE_SCRIPT,
                        "params": {
                            "query_vector": query.vector(),
                            "keyword_weight": query.keyword().weight
                        }
                    }
                }
            },
            "_source": {"excludes": [fields::VECTOR_EMBEDDING]}
        })
    }

    /// Read hits out of a `_search` reply.
    ///
    /// # Errors
    /// Returns an error if the reply does not have the `hits.hits` shape.
    pub fn parse_hits(body: Value) -> Result<Vec<ScoredDocument>> {
        let reply: SearchReply = serde_json::from_value(body)
            .map_err(|error| Error::Retrieval(format!("Unreadable search reply: {error}")))?;
        Ok(reply.hits.hits.into_iter().map(Hit::into_document).collect())
    }
}

fn render_predicate(predicate: &Predicate) -> Value {
    match predicate {
        Predicate::Match { field, value } => json!({"match": {*field: value}}),
        Predicate::Term { field, value } => json!({"term": {*field: value}}),
    }
}

fn render_keyword(keyword: &KeywordQuery) -> Vec<Value> {
    if keyword.text.is_empty() {
        return Vec::new();
    }
    keyword
        .fields
        .iter()
        .map(|field| {
            let clause = if field.phrase { "match_phrase" } else { "match" };
            json!({clause: {field.field: {"query": keyword.text, "boost": field.boost}}})
        })
        .collect()
}

#[derive(Deserialize)]
struct SearchReply {
    hits: HitList,
}

#[derive(Deserialize)]
struct HitList {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f32>,
    #[serde(rename = "_source", default)]
    source: Source,
}

/// Stored fields; older documents only carry the ingestion-time subset.
#[derive(Deserialize, Default)]
#[serde(default)]
struct Source {
    scientific_name: String,
    vietnamese_name: Option<String>,
    family: Option<String>,
    danger_level: Option<String>,
    distribution: Option<String>,
    biology: Option<String>,
    venom: Option<String>,
    max_len_cm: Option<f32>,
    full_text_context: Option<String>,
}

impl Hit {
    fn into_document(self) -> ScoredDocument {
        let Source {
            scientific_name,
            vietnamese_name,
            family,
            danger_level,
            distribution,
            biology,
            venom,
            max_len_cm,
            full_text_context,
        } = self.source;

        let biology_text = biology
            .filter(|text| !text.trim().is_empty())
            .or(full_text_context)
            .unwrap_or_default();

        ScoredDocument {
            id: self.id,
            scientific_name,
            local_name: vietnamese_name.unwrap_or_default(),
            family: family.unwrap_or_default(),
            danger_level: danger_level.unwrap_or_default(),
            country: distribution.unwrap_or_default(),
            biology_text,
            venom_text: venom.unwrap_or_default(),
            max_length_cm: max_len_cm,
            score: self.score.unwrap_or(0.0),
        }
    }
}

#[async_trait]
impl SearchBackend for ElasticsearchBackend {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn ping(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                warn!(url = %self.url, %error, "elasticsearch ping failed");
                false
            }
        }
    }

    async fn search(&self, query: &RetrievalQuery) -> Result<Vec<ScoredDocument>> {
        let endpoint = format!("{}/{}/_search", self.url, self.index);
        let response = self
            .client
            .post(&endpoint)
            .json(&Self::request_body(query))
            .send()
            .await
            .map_err(|error| Error::Retrieval(format!("Search request failed: {error}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Retrieval(format!(
                "Search failed with status {status}: {error_text}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| Error::Retrieval(format!("Unreadable search reply: {error}")))?;
        let hits = Self::parse_hits(body)?;
        debug!(index = %self.index, hits = hits.len(), "elasticsearch search");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hits_maps_source_fields() {
        let body = json!({
            "took": 3,
            "hits": {
                "total": {"value": 2},
                "hits": [
                    {
                        "_id": "Naja_kaouthia",
                        "_score": 1.72,
                        "_source": {
                            "scientific_name": "Naja kaouthia",
                            "vietnamese_name": "Rắn hổ mang một mắt kính",
                            "family": "Elapidae",
                            "danger_level": "Highly venomous",
                            "distribution": "Vietnam, Thailand",
                            "biology": "Thân màu nâu.",
                            "max_len_cm": 150.0
                        }
                    },
                    {
                        "_id": "Python_bivittatus",
                        "_score": 1.2,
                        "_source": {
                            "scientific_name": "Python bivittatus",
                            "full_text_context": "Species: Python bivittatus."
                        }
                    }
                ]
            }
        });

        let hits = ElasticsearchBackend::parse_hits(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].local_name, "Rắn hổ mang một mắt kính");
        assert_eq!(hits[0].country, "Vietnam, Thailand");
        assert_eq!(hits[0].max_length_cm, Some(150.0));
        assert!((hits[0].score - 1.72).abs() < 1e-6);
        assert_eq!(hits[1].biology_text, "Species: Python bivittatus.");
        assert_eq!(hits[1].display_name(), "Python bivittatus");
    }

    #[test]
    fn test_parse_hits_rejects_wrong_shape() {
        let result = ElasticsearchBackend::parse_hits(json!({"error": "index_not_found"}));
        assert!(matches!(result, Err(Error::Retrieval(_))));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend = ElasticsearchBackend::new("http://localhost:9200/", "snakes");
        assert_eq!(backend.url, "http://localhost:9200");
    }
}
