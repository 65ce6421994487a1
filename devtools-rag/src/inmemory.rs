//! In-memory document store.
//!
//! This module provides [`InMemoryDocumentStore`], a non-durable backend kept
//! in `HashMap`s behind a `tokio::sync::RwLock`. It is suitable for tests and
//! for hosts that do not need context to survive a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::ContextDocument;
use crate::error::{StoreError, StoreErrorKind};
use crate::health::StoreProbe;
use crate::store::{DocumentStore, LastErrorSlot, StoreContents, StoreResult, StoredEntry};

const BACKEND: &str = "in-memory";

#[derive(Debug, Default)]
struct Tables {
    // Insertion order of document ids, so loads are stable.
    order: Vec<String>,
    documents: HashMap<String, ContextDocument>,
    embeddings: HashMap<String, Vec<f32>>,
}

impl Tables {
    fn insert_document(&mut self, document: &ContextDocument) {
        if self.documents.insert(document.id.clone(), document.clone()).is_none() {
            self.order.push(document.id.clone());
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        self.embeddings.remove(id);
        let removed = self.documents.remove(id).is_some();
        if removed {
            self.order.retain(|existing| existing != id);
        }
        removed
    }
}

/// A volatile [`DocumentStore`].
///
/// An optional item limit stands in for a storage quota: writes that would
/// push the document count past it fail with
/// [`StoreErrorKind::QuotaExceeded`].
///
/// # Example
///
/// ```rust,ignore
/// use devtools_rag::{DocumentStore, InMemoryDocumentStore};
///
/// let store = InMemoryDocumentStore::new();
/// store.open().await?;
/// assert_eq!(store.count().await?, 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    tables: RwLock<Tables>,
    open: AtomicBool,
    quota_items: Option<usize>,
    last_error: LastErrorSlot,
}

impl InMemoryDocumentStore {
    /// Create a new empty store. It must be opened before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the store to `max_items` documents.
    pub fn with_quota(mut self, max_items: usize) -> Self {
        self.quota_items = Some(max_items);
        self
    }

    fn ensure_open(&self, operation: &str) -> StoreResult<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(self.last_error.record(StoreError::new(
                StoreErrorKind::Connection,
                operation,
                "store is not open",
            )))
        }
    }

    fn check_quota(&self, tables: &Tables, new_ids: &[&str], operation: &str) -> StoreResult<()> {
        let Some(limit) = self.quota_items else {
            return Ok(());
        };
        let mut added: Vec<&str> =
            new_ids.iter().copied().filter(|id| !tables.documents.contains_key(*id)).collect();
        added.sort_unstable();
        added.dedup();
        if tables.documents.len() + added.len() > limit {
            return Err(self.last_error.record(StoreError::new(
                StoreErrorKind::QuotaExceeded,
                operation,
                format!("quota of {limit} documents exceeded"),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn open(&self) -> StoreResult<()> {
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    async fn put_document(&self, document: &ContextDocument) -> StoreResult<()> {
        self.ensure_open("put_document")?;
        let mut tables = self.tables.write().await;
        self.check_quota(&tables, &[document.id.as_str()], "put_document")?;
        tables.insert_document(document);
        Ok(())
    }

    async fn put_embedding(&self, document_id: &str, embedding: &[f32]) -> StoreResult<()> {
        self.ensure_open("put_embedding")?;
        let mut tables = self.tables.write().await;
        if !tables.documents.contains_key(document_id) {
            return Err(self.last_error.record(StoreError::new(
                StoreErrorKind::Transaction,
                "put_embedding",
                format!("no document with id '{document_id}'"),
            )));
        }
        tables.embeddings.insert(document_id.to_string(), embedding.to_vec());
        Ok(())
    }

    async fn put_entries(&self, entries: &[StoredEntry]) -> StoreResult<()> {
        self.ensure_open("put_entries")?;
        let mut tables = self.tables.write().await;
        let ids: Vec<&str> = entries.iter().map(|e| e.document.id.as_str()).collect();
        self.check_quota(&tables, &ids, "put_entries")?;
        for entry in entries {
            tables.insert_document(&entry.document);
            tables.embeddings.insert(entry.document.id.clone(), entry.embedding.clone());
        }
        Ok(())
    }

    async fn load_all(&self) -> StoreResult<StoreContents> {
        self.ensure_open("load_all")?;
        let tables = self.tables.read().await;
        Ok(StoreContents {
            documents: tables
                .order
                .iter()
                .filter_map(|id| tables.documents.get(id).cloned())
                .collect(),
            embeddings: tables.embeddings.clone(),
        })
    }

    async fn delete(&self, ids: &[&str]) -> StoreResult<usize> {
        self.ensure_open("delete")?;
        let mut tables = self.tables.write().await;
        Ok(ids.iter().filter(|id| tables.remove(id)).count())
    }

    async fn set_bookmark(&self, id: &str, bookmarked: bool) -> StoreResult<bool> {
        self.ensure_open("set_bookmark")?;
        let mut tables = self.tables.write().await;
        match tables.documents.get_mut(id) {
            Some(document) => {
                document.bookmarked = bookmarked;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self) -> StoreResult<usize> {
        self.ensure_open("count")?;
        Ok(self.tables.read().await.documents.len())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.ensure_open("clear")?;
        *self.tables.write().await = Tables::default();
        Ok(())
    }

    async fn replace_all(&self, entries: &[StoredEntry]) -> StoreResult<()> {
        self.ensure_open("replace_all")?;
        let mut tables = self.tables.write().await;
        let mut replacement = Tables::default();
        let ids: Vec<&str> = entries.iter().map(|e| e.document.id.as_str()).collect();
        self.check_quota(&replacement, &ids, "replace_all")?;
        for entry in entries {
            replacement.insert_document(&entry.document);
            replacement.embeddings.insert(entry.document.id.clone(), entry.embedding.clone());
        }
        *tables = replacement;
        Ok(())
    }

    async fn probe(&self) -> StoreResult<StoreProbe> {
        self.ensure_open("initialize")?;
        let document_count = self.tables.read().await.documents.len();
        Ok(StoreProbe { document_count, schema_version: None })
    }

    fn last_error(&self) -> Option<StoreError> {
        self.last_error.get()
    }

    fn clear_last_error(&self) {
        self.last_error.clear();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::category::Category;

    fn entry(id: &str) -> StoredEntry {
        StoredEntry {
            document: ContextDocument {
                id: id.into(),
                parent_id: "p".into(),
                content: format!("content of {id}"),
                kind: "CONSOLE".into(),
                category: Category::Console,
                url: String::new(),
                title: String::new(),
                timestamp: Utc::now(),
                chunk_index: 0,
                total_chunks: 1,
                relevance_score: 0.5,
                bookmarked: false,
            },
            embedding: vec![1.0, 0.0],
        }
    }

    #[tokio::test]
    async fn operations_fail_until_opened() {
        let store = InMemoryDocumentStore::new();
        let err = store.count().await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Connection);
        assert_eq!(store.last_error().map(|e| e.operation), Some("count".to_string()));

        store.open().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_removes_document_and_embedding() {
        let store = InMemoryDocumentStore::new();
        store.open().await.unwrap();
        store.put_entries(&[entry("a"), entry("b")]).await.unwrap();

        assert_eq!(store.delete(&["a", "missing"]).await.unwrap(), 1);
        let contents = store.load_all().await.unwrap();
        assert_eq!(contents.documents.len(), 1);
        assert!(!contents.embeddings.contains_key("a"));
        assert!(contents.embeddings.contains_key("b"));
    }

    #[tokio::test]
    async fn embedding_requires_its_document() {
        let store = InMemoryDocumentStore::new();
        store.open().await.unwrap();
        assert!(store.put_embedding("ghost", &[1.0]).await.is_err());
    }

    #[tokio::test]
    async fn quota_rejects_the_whole_batch() {
        let store = InMemoryDocumentStore::new().with_quota(2);
        store.open().await.unwrap();
        store.put_entries(&[entry("a")]).await.unwrap();

        let err = store.put_entries(&[entry("b"), entry("c")]).await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.count().await.unwrap(), 1);

        // Rewriting an existing id does not count against the quota.
        store.put_entries(&[entry("a"), entry("b")]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn replace_over_quota_keeps_previous_contents() {
        let store = InMemoryDocumentStore::new().with_quota(2);
        store.open().await.unwrap();
        store.put_entries(&[entry("a"), entry("b")]).await.unwrap();

        let err = store.replace_all(&[entry("c"), entry("d"), entry("e")]).await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(err.operation, "replace_all");
        let ids: Vec<_> =
            store.load_all().await.unwrap().documents.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        store.replace_all(&[entry("c"), entry("d")]).await.unwrap();
        let contents = store.load_all().await.unwrap();
        let ids: Vec<_> = contents.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
        assert!(!contents.embeddings.contains_key("a"));
    }
}
