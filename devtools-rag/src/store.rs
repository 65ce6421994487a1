//! Persistent store trait for documents and their embeddings.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::error;

use crate::document::ContextDocument;
use crate::error::StoreError;
use crate::health::StoreProbe;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A document paired with its embedding, written and deleted together.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub document: ContextDocument,
    pub embedding: Vec<f32>,
}

/// Full contents of a store: every document and every embedding keyed by document id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreContents {
    pub documents: Vec<ContextDocument>,
    pub embeddings: HashMap<String, Vec<f32>>,
}

impl StoreContents {
    /// Pair documents with their embeddings, preserving document order.
    ///
    /// Returns the index-aligned pairs and the ids of documents that had no
    /// embedding.
    pub fn into_aligned(mut self) -> (Vec<ContextDocument>, Vec<Vec<f32>>, Vec<String>) {
        let mut documents = Vec::with_capacity(self.documents.len());
        let mut embeddings = Vec::with_capacity(self.documents.len());
        let mut orphans = Vec::new();
        for document in self.documents {
            match self.embeddings.remove(&document.id) {
                Some(embedding) => {
                    documents.push(document);
                    embeddings.push(embedding);
                }
                None => orphans.push(document.id),
            }
        }
        (documents, embeddings, orphans)
    }
}

/// Durable storage for two co-located tables: `documents` keyed by id and
/// `embeddings` keyed by the same id.
///
/// Every failing operation records its [`StoreError`] as the store's last
/// error (see [`LastErrorSlot`]) and returns it. Nothing is silently dropped.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name used in logs and diagnostics.
    fn backend(&self) -> &str;

    /// Open or create the storage. Idempotent.
    async fn open(&self) -> StoreResult<()>;

    /// Release the storage. Later operations fail until `open` is called again.
    async fn close(&self);

    /// Insert or replace a single document.
    async fn put_document(&self, document: &ContextDocument) -> StoreResult<()>;

    /// Insert or replace the embedding of an existing document.
    async fn put_embedding(&self, document_id: &str, embedding: &[f32]) -> StoreResult<()>;

    /// Write documents and their embeddings in one atomic unit.
    async fn put_entries(&self, entries: &[StoredEntry]) -> StoreResult<()>;

    /// Read both tables in full.
    async fn load_all(&self) -> StoreResult<StoreContents>;

    /// Delete documents and their embeddings. Returns how many documents were removed.
    async fn delete(&self, ids: &[&str]) -> StoreResult<usize>;

    /// Set the bookmark flag. Returns `false` if no such document exists.
    async fn set_bookmark(&self, id: &str, bookmarked: bool) -> StoreResult<bool>;

    /// Number of stored documents.
    async fn count(&self) -> StoreResult<usize>;

    /// Empty both tables.
    async fn clear(&self) -> StoreResult<()>;

    /// Replace the contents of both tables with `entries` in one atomic unit.
    /// On failure the previous contents are kept.
    async fn replace_all(&self, entries: &[StoredEntry]) -> StoreResult<()>;

    /// Open the storage afresh and count its documents, without touching any
    /// state held by this instance.
    async fn probe(&self) -> StoreResult<StoreProbe>;

    /// The most recent failure, if any.
    fn last_error(&self) -> Option<StoreError>;

    /// Forget the most recent failure.
    fn clear_last_error(&self);
}

/// Holds the most recent [`StoreError`] of a store.
#[derive(Debug, Default)]
pub struct LastErrorSlot {
    slot: Mutex<Option<StoreError>>,
}

impl LastErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and remember `error`, handing it back for propagation.
    pub fn record(&self, error: StoreError) -> StoreError {
        error!(
            operation = %error.operation,
            kind = %error.kind,
            error = %error.message,
            "store operation failed"
        );
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
        error
    }

    pub fn get(&self) -> Option<StoreError> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::category::Category;
    use crate::error::StoreErrorKind;

    fn doc(id: &str) -> ContextDocument {
        ContextDocument {
            id: id.into(),
            parent_id: id.into(),
            content: "c".into(),
            kind: "HTML".into(),
            category: Category::Html,
            url: String::new(),
            title: String::new(),
            timestamp: Utc::now(),
            chunk_index: 0,
            total_chunks: 1,
            relevance_score: 0.5,
            bookmarked: false,
        }
    }

    #[test]
    fn aligns_documents_with_embeddings() {
        let contents = StoreContents {
            documents: vec![doc("a"), doc("b"), doc("c")],
            embeddings: HashMap::from([("c".into(), vec![3.0]), ("a".into(), vec![1.0])]),
        };
        let (documents, embeddings, orphans) = contents.into_aligned();
        let ids: Vec<_> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(embeddings, vec![vec![1.0], vec![3.0]]);
        assert_eq!(orphans, vec!["b".to_string()]);
    }

    #[test]
    fn last_error_slot_records_and_clears() {
        let slot = LastErrorSlot::new();
        assert!(slot.get().is_none());
        let returned = slot.record(StoreError::new(StoreErrorKind::Transaction, "clear", "boom"));
        assert_eq!(slot.get(), Some(returned));
        slot.clear();
        assert!(slot.get().is_none());
    }
}
