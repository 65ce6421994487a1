//! Similarity scoring and ranking.
//!
//! Ranking is a full scan over (document, embedding) pairs: the store is
//! bounded by the eviction limits, so no index structure is kept.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::document::{ContextDocument, SearchResult};

/// Floor of the recency multiplier.
const MIN_RECENCY_BOOST: f32 = 0.5;

/// Age, in hours, at which the recency multiplier reaches its floor.
const RECENCY_WINDOW_HOURS: f32 = 24.0;

/// Similarity floor of category-aware search when none is configured.
pub const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.3;

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if the vectors differ in length or either has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Multiplier favouring recent documents: `max(0.5, 1 - age_hours / 24)`.
pub fn recency_boost(age: Duration) -> f32 {
    let hours = age.as_secs_f32() / 3600.0;
    (1.0 - hours / RECENCY_WINDOW_HOURS).max(MIN_RECENCY_BOOST)
}

/// Options for category-aware search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    /// Only documents in these categories are considered. Empty means all.
    pub categories: Vec<Category>,
    /// Documents with a lower relevance score are skipped.
    pub min_relevance: f32,
    pub max_results: usize,
    /// Apply [`recency_boost`] to the score.
    pub boost_recent: bool,
    /// Documents with a lower similarity are discarded. Unset means the
    /// engine's configured threshold, or [`DEFAULT_SEMANTIC_THRESHOLD`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_threshold: Option<f32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            min_relevance: 0.0,
            max_results: 10,
            boost_recent: true,
            semantic_threshold: None,
        }
    }
}

impl SearchOptions {
    pub fn with_categories<I, C>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Category>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_relevance(mut self, min_relevance: f32) -> Self {
        self.min_relevance = min_relevance;
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn boost_recent(mut self, boost: bool) -> Self {
        self.boost_recent = boost;
        self
    }

    pub fn semantic_threshold(mut self, threshold: f32) -> Self {
        self.semantic_threshold = Some(threshold);
        self
    }

    fn admits(&self, document: &ContextDocument) -> bool {
        (self.categories.is_empty() || self.categories.contains(&document.category))
            && document.relevance_score >= self.min_relevance
    }
}

fn sort_descending(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

/// Plain search: the `top_k` pairs most similar to `query`, scored by
/// similarity alone.
pub fn rank_by_similarity<'a>(
    query: &[f32],
    pairs: impl IntoIterator<Item = (&'a ContextDocument, &'a [f32])>,
    top_k: usize,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = pairs
        .into_iter()
        .map(|(document, embedding)| {
            let similarity = cosine_similarity(query, embedding);
            SearchResult { document: document.clone(), similarity, score: similarity }
        })
        .collect();
    sort_descending(&mut results);
    results.truncate(top_k);
    results
}

/// Category-aware search.
///
/// Pairs are filtered by category and relevance, discarded below the
/// semantic threshold, then scored as
/// `similarity × category weight × relevance × recency` and truncated to
/// `max_results`.
pub fn score_candidates<'a>(
    query: &[f32],
    pairs: impl IntoIterator<Item = (&'a ContextDocument, &'a [f32])>,
    options: &SearchOptions,
    now: DateTime<Utc>,
) -> Vec<SearchResult> {
    let threshold = options.semantic_threshold.unwrap_or(DEFAULT_SEMANTIC_THRESHOLD);
    let mut results: Vec<SearchResult> = pairs
        .into_iter()
        .filter(|(document, _)| options.admits(document))
        .filter_map(|(document, embedding)| {
            let similarity = cosine_similarity(query, embedding);
            if similarity < threshold {
                return None;
            }
            let recency =
                if options.boost_recent { recency_boost(document.age(now)) } else { 1.0 };
            let score =
                similarity * document.category.weight() * document.relevance_score * recency;
            Some(SearchResult { document: document.clone(), similarity, score })
        })
        .collect();
    sort_descending(&mut results);
    results.truncate(options.max_results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, category: Category, relevance: f32, hours_old: i64) -> ContextDocument {
        ContextDocument {
            id: id.into(),
            parent_id: id.into(),
            content: id.into(),
            kind: category.label().to_string(),
            category,
            url: String::new(),
            title: String::new(),
            timestamp: Utc::now() - chrono::Duration::hours(hours_old),
            chunk_index: 0,
            total_chunks: 1,
            relevance_score: relevance,
            bookmarked: false,
        }
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn recency_boost_decays_to_floor() {
        assert_eq!(recency_boost(Duration::ZERO), 1.0);
        assert!((recency_boost(Duration::from_secs(6 * 3600)) - 0.75).abs() < 1e-6);
        assert_eq!(recency_boost(Duration::from_secs(20 * 3600)), 0.5);
        assert_eq!(recency_boost(Duration::from_secs(72 * 3600)), 0.5);
    }

    #[test]
    fn plain_search_ignores_threshold_and_truncates() {
        let a = doc("a", Category::Html, 0.5, 0);
        let b = doc("b", Category::Html, 0.5, 0);
        let c = doc("c", Category::Html, 0.5, 0);
        let (ea, eb, ec) = (vec![1.0, 0.0], vec![0.1, 1.0], vec![0.7, 0.7]);
        let pairs = vec![(&a, ea.as_slice()), (&b, eb.as_slice()), (&c, ec.as_slice())];

        let results = rank_by_similarity(&[1.0, 0.0], pairs, 3);
        let ids: Vec<_> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(results[2].similarity < 0.3);
    }

    #[test]
    fn category_search_filters_and_weights() {
        let console = doc("console", Category::Console, 0.9, 0);
        let html = doc("html", Category::Html, 1.0, 0);
        let stale = doc("stale", Category::Console, 0.9, 48);
        let low = doc("low", Category::Console, 0.1, 0);
        let off = doc("off", Category::Console, 0.9, 0);
        let same = vec![1.0, 0.0];
        let orthogonal = vec![0.0, 1.0];
        let pairs = vec![
            (&console, same.as_slice()),
            (&html, same.as_slice()),
            (&stale, same.as_slice()),
            (&low, same.as_slice()),
            (&off, orthogonal.as_slice()),
        ];

        let options = SearchOptions::default().with_categories(["CONSOLE"]).min_relevance(0.2);
        let results = score_candidates(&[1.0, 0.0], pairs, &options, Utc::now());
        let ids: Vec<_> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["console", "stale"]);
        assert!((results[0].score - 0.8 * 0.9).abs() < 1e-3);
        assert!((results[1].score - 0.8 * 0.9 * 0.5).abs() < 1e-3);
    }

    #[test]
    fn options_serialize_in_camel_case() {
        let json = serde_json::to_value(SearchOptions::default()).unwrap();
        assert_eq!(json["maxResults"], 10);
        assert_eq!(json["boostRecent"], true);
        assert!(json.get("semanticThreshold").is_none());

        let options: SearchOptions =
            serde_json::from_str(r#"{"categories":["CONSOLE"],"semanticThreshold":0.5}"#).unwrap();
        assert_eq!(options.semantic_threshold, Some(0.5));
        assert_eq!(options.max_results, 10);
    }

    #[test]
    fn unset_threshold_uses_the_default() {
        let near = doc("near", Category::Html, 1.0, 0);
        let far = doc("far", Category::Html, 1.0, 0);
        let (en, ef) = (vec![1.0, 0.0], vec![0.2, 1.0]);
        let pairs = || vec![(&near, en.as_slice()), (&far, ef.as_slice())];

        let defaults = SearchOptions::default();
        assert_eq!(score_candidates(&[1.0, 0.0], pairs(), &defaults, Utc::now()).len(), 1);

        let loose = SearchOptions::default().semantic_threshold(0.0);
        assert_eq!(score_candidates(&[1.0, 0.0], pairs(), &loose, Utc::now()).len(), 2);
    }
}
