//! Data types for captured records, stored documents, and search results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;

/// Relevance assigned to documents whose capturer did not supply one.
pub const NEUTRAL_RELEVANCE: f32 = 0.5;

/// A raw record pushed by a page-context collaborator (page capture,
/// network monitor, DOM-mutation observer).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextRecord {
    /// Free-form capture type (`HTML`, `network_request`, `console`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// The captured text.
    pub content: String,
    /// Capture time. Defaults to the ingestion time.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub timestamp: Option<DateTime<Utc>>,
    /// URL of the capturing page.
    #[serde(default)]
    pub url: String,
    /// Title of the capturing page.
    #[serde(default)]
    pub title: String,
    /// Explicit category. Falls back to parsing `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Caller-assigned importance in `0..=1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
    /// Protect the document from age-based eviction.
    #[serde(default)]
    pub bookmarked: bool,
}

impl ContextRecord {
    /// Create a record with the given capture type and content.
    pub fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
            timestamp: None,
            url: String::new(),
            title: String::new(),
            category: None,
            relevance_score: None,
            bookmarked: false,
        }
    }

    /// Set the page URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the page title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set an explicit category.
    pub fn with_category(mut self, category: impl Into<Category>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the relevance score.
    pub fn with_relevance(mut self, score: f32) -> Self {
        self.relevance_score = Some(score);
        self
    }

    /// Set the capture time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Mark the record as bookmarked.
    pub fn bookmarked(mut self) -> Self {
        self.bookmarked = true;
        self
    }

    /// The effective category: explicit if set, otherwise parsed from `kind`.
    pub fn resolved_category(&self) -> Category {
        self.category.clone().unwrap_or_else(|| Category::parse(&self.kind))
    }

    /// The effective relevance, clamped to `0..=1`.
    pub fn resolved_relevance(&self) -> f32 {
        match self.relevance_score {
            Some(score) if score.is_finite() => score.clamp(0.0, 1.0),
            _ => NEUTRAL_RELEVANCE,
        }
    }
}

/// Metadata accepted by
/// [`ContextEngine::add_categorized_document`](crate::ContextEngine::add_categorized_document).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default)]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub bookmarked: bool,
}

impl DocumentMetadata {
    pub(crate) fn into_record(self, content: impl Into<String>) -> ContextRecord {
        ContextRecord {
            kind: self.category.label().to_string(),
            content: content.into(),
            timestamp: None,
            url: self.url,
            title: self.title,
            category: Some(self.category),
            relevance_score: self.relevance_score,
            bookmarked: self.bookmarked,
        }
    }
}

/// A stored chunk of captured context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextDocument {
    /// Unique identifier, `{parent_id}_chunk_{chunk_index}`.
    pub id: String,
    /// Identifier shared by all chunks of one ingested record.
    pub parent_id: String,
    /// Normalized chunk text.
    pub content: String,
    /// Capture type as reported by the collaborator.
    #[serde(rename = "type")]
    pub kind: String,
    pub category: Category,
    pub url: String,
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub relevance_score: f32,
    pub bookmarked: bool,
}

impl ContextDocument {
    /// How long ago the document was captured. Never negative.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the document was captured more than `max_age` before `now`.
    pub fn is_older_than(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}

/// A retrieved [`ContextDocument`] with its raw similarity and final ranking score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub document: ContextDocument,
    /// Cosine similarity between the query and the document.
    pub similarity: f32,
    /// Similarity after category, relevance, and recency weighting.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_defaults_resolve_from_kind() {
        let record = ContextRecord::new("network_request", "GET /api 500");
        assert_eq!(record.resolved_category(), Category::Network);
        assert_eq!(record.resolved_relevance(), NEUTRAL_RELEVANCE);

        let record = record.with_category("SECURITY").with_relevance(3.0);
        assert_eq!(record.resolved_category(), Category::Security);
        assert_eq!(record.resolved_relevance(), 1.0);
    }

    #[test]
    fn record_deserializes_from_collaborator_json() {
        let record: ContextRecord = serde_json::from_str(
            r#"{"type":"CONSOLE","content":"boom","timestamp":1700000000000,"url":"https://a.test","relevanceScore":0.9}"#,
        )
        .unwrap();
        assert_eq!(record.kind, "CONSOLE");
        assert_eq!(record.timestamp.map(|t| t.timestamp_millis()), Some(1_700_000_000_000));
        assert_eq!(record.relevance_score, Some(0.9));
        assert!(record.category.is_none());
    }

    #[test]
    fn future_timestamps_have_zero_age() {
        let now = Utc::now();
        let doc = ContextDocument {
            id: "a_chunk_0".into(),
            parent_id: "a".into(),
            content: "x".into(),
            kind: "HTML".into(),
            category: Category::Html,
            url: String::new(),
            title: String::new(),
            timestamp: now + chrono::Duration::hours(1),
            chunk_index: 0,
            total_chunks: 1,
            relevance_score: 0.5,
            bookmarked: false,
        };
        assert_eq!(doc.age(now), Duration::ZERO);
        assert!(!doc.is_older_than(now, Duration::from_secs(1)));
    }
}
