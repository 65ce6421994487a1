//! Eviction planning and export/import snapshots.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::document::ContextDocument;
use crate::error::{RagError, Result};

/// Choose which documents to evict.
///
/// Every unbookmarked document older than `max_age` goes first. If more than
/// `max_count` documents remain, the oldest unbookmarked ones follow until the
/// count is at the limit or only bookmarked documents are left. Bookmarked
/// documents are never chosen.
pub fn plan_eviction(
    documents: &[ContextDocument],
    now: DateTime<Utc>,
    max_age: Duration,
    max_count: usize,
) -> Vec<String> {
    let (stale, mut kept): (Vec<&ContextDocument>, Vec<&ContextDocument>) = documents
        .iter()
        .partition(|doc| !doc.bookmarked && doc.is_older_than(now, max_age));

    let mut evicted: Vec<String> = stale.into_iter().map(|doc| doc.id.clone()).collect();

    if kept.len() > max_count {
        let excess = kept.len() - max_count;
        kept.retain(|doc| !doc.bookmarked);
        kept.sort_by_key(|doc| doc.timestamp);
        evicted.extend(kept.into_iter().take(excess).map(|doc| doc.id.clone()));
    }
    evicted
}

/// Filters for [`ContextEngine::export_context_data`](crate::ContextEngine::export_context_data).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportOptions {
    pub include_embeddings: bool,
    /// Only export these categories. Empty means all.
    pub categories: Vec<Category>,
    /// Only export documents newer than this.
    pub max_age: Option<Duration>,
}

impl ExportOptions {
    pub(crate) fn admits(&self, document: &ContextDocument, now: DateTime<Utc>) -> bool {
        let in_category =
            self.categories.is_empty() || self.categories.contains(&document.category);
        let fresh = self.max_age.is_none_or(|max_age| document.age(now) < max_age);
        in_category && fresh
    }
}

/// A document in a [`ContextSnapshot`], with its embedding when exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedDocument {
    #[serde(flatten)]
    pub document: ContextDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A point-in-time backup of stored context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub export_date: DateTime<Utc>,
    pub document_count: usize,
    /// Distinct categories of the exported documents, in first-seen order.
    pub categories: Vec<Category>,
    pub documents: Vec<ExportedDocument>,
}

impl ContextSnapshot {
    pub(crate) fn new(documents: Vec<ExportedDocument>) -> Self {
        let mut seen = HashSet::new();
        let categories = documents
            .iter()
            .map(|d| &d.document.category)
            .filter(|c| seen.insert(*c))
            .cloned()
            .collect();
        Self { export_date: Utc::now(), document_count: documents.len(), categories, documents }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reject snapshots whose header disagrees with their body.
    pub fn validate(&self) -> Result<()> {
        if self.document_count != self.documents.len() {
            return Err(RagError::Snapshot(format!(
                "snapshot declares {} documents but holds {}",
                self.document_count,
                self.documents.len()
            )));
        }
        Ok(())
    }
}

/// How an imported snapshot combines with existing context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Discard existing context first.
    Replace,
    /// Keep existing context; snapshot documents overwrite ones with the same id.
    #[default]
    Merge,
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    /// Documents whose embedding was missing or malformed and was recomputed.
    pub reembedded: usize,
    /// Documents dropped for having no id or no content.
    pub skipped: usize,
    /// Documents evicted afterwards to bring the store back under its item limit.
    pub evicted: usize,
}
