//! Query pipeline: topic keyword pre-filter → heading embedding similarity →
//! deterministic top-N.
//!
//! A topic is searched when a query token names it (case-insensitive), when
//! the caller filters on it explicitly, or when it is the catch-all topic,
//! which is searched for every query. Candidates are ranked by cosine
//! similarity between the query vector and each record's heading vector.
//! Exact score ties go to the earlier record by `(topic, position)`, so the
//! same query against an unchanged corpus always yields the same answer.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::embedding::{cosine_similarity, EmbeddingCache, EmbeddingProvider};
use crate::error::{LiaError, Result};
use crate::knowledge::{KnowledgeStore, Record};

/// Number of results returned: the primary answer plus two similar answers.
pub const TOP_N_RESULTS: usize = 3;

/// A ranked record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: Record,
    pub score: f32,
}

/// Coarse similarity band used to decide whether the best match is worth
/// showing as an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Relevance {
    Low,
    Medium,
    High,
}

impl Relevance {
    pub const HIGH_LOWER_BOUND: f32 = 0.8;
    pub const MEDIUM_LOWER_BOUND: f32 = 0.6;

    pub fn from_score(score: f32) -> Self {
        if score >= Self::HIGH_LOWER_BOUND {
            Self::High
        } else if score >= Self::MEDIUM_LOWER_BOUND {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Lower-cased query tokens with surrounding punctuation removed.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// Topics to search for `query`, in ascending name order, catch-all included.
///
/// `topic_filter` must name an existing topic.
pub fn candidate_topics(
    query: &str,
    topics: &[String],
    topic_filter: Option<&str>,
    catch_all: &str,
) -> Result<Vec<String>> {
    let tokens: HashSet<String> = tokenize(query).into_iter().collect();
    let mut candidates: BTreeSet<String> = topics
        .iter()
        .filter(|topic| tokens.contains(&topic.to_lowercase()))
        .cloned()
        .collect();

    if let Some(filter) = topic_filter {
        if !topics.iter().any(|t| t == filter) {
            return Err(LiaError::UnknownTopic(filter.to_string()));
        }
        candidates.insert(filter.to_string());
    }

    candidates.insert(catch_all.to_string());
    Ok(candidates.into_iter().collect())
}

/// Sort scored records by descending score, ties by ascending
/// `(topic, position)`, and keep the first `n`.
pub fn rank(mut scored: Vec<SearchHit>, n: usize) -> Vec<SearchHit> {
    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.record.topic.cmp(&b.record.topic))
            .then_with(|| a.record.position.cmp(&b.record.position))
    });
    scored.truncate(n);
    scored
}

/// The query pipeline over one knowledge store, cache, and model.
pub struct QueryPipeline<'a> {
    store: &'a mut KnowledgeStore,
    cache: &'a EmbeddingCache,
    provider: &'a dyn EmbeddingProvider,
}

impl<'a> QueryPipeline<'a> {
    pub fn new(
        store: &'a mut KnowledgeStore,
        cache: &'a EmbeddingCache,
        provider: &'a dyn EmbeddingProvider,
    ) -> Self {
        Self {
            store,
            cache,
            provider,
        }
    }

    /// Up to [`TOP_N_RESULTS`] records ranked by heading similarity to `query`.
    ///
    /// An empty corpus, or candidate topics without records, yields an empty
    /// list. Topics that fail to load and records whose embedding fails are
    /// skipped.
    pub fn search(&mut self, query: &str, topic_filter: Option<&str>) -> Result<Vec<SearchHit>> {
        let topics = self.store.topics()?;
        let catch_all = self.store.catch_all().to_string();
        let candidates = candidate_topics(query, &topics, topic_filter, &catch_all)?;
        tracing::debug!(?candidates, "candidate topics");

        let mut records: Vec<Record> = Vec::new();
        for topic in &candidates {
            match self.store.load_topic(topic) {
                Ok(load) => {
                    if load.changed {
                        let live: HashSet<String> =
                            load.records.iter().map(Record::content_hash).collect();
                        self.cache.retain_topic(topic, &live);
                    }
                    records.extend(load.records.iter().cloned());
                }
                // The catch-all may have been deleted by the user; it is then empty.
                Err(LiaError::UnknownTopic(_)) if *topic == catch_all => {}
                // A filtered topic deleted mid-query is reported, not skipped.
                Err(e @ LiaError::UnknownTopic(_)) if topic_filter == Some(topic.as_str()) => {
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(topic = %topic, error = %e, "skipping unreadable topic");
                }
            }
        }

        if records.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self
            .provider
            .embed(query)
            .map_err(|e| LiaError::EmbeddingCompute(format!("query: {e:#}")))?;

        let mut scored = Vec::with_capacity(records.len());
        for record in records {
            match self.cache.get(&record, self.provider) {
                Ok(vector) => {
                    let score = cosine_similarity(&query_vector, &vector);
                    scored.push(SearchHit { record, score });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "excluding record from ranking");
                }
            }
        }

        let ranked = rank(scored, TOP_N_RESULTS);
        tracing::info!(
            results = ranked.len(),
            top_score = ranked.first().map(|h| h.score),
            cache_hits = self.cache.hits(),
            cache_misses = self.cache.misses(),
            "query ranked"
        );
        Ok(ranked)
    }
}
