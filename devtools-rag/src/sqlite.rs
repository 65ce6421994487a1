//! SQLite document store backend.
//!
//! Provides [`SqliteDocumentStore`] which implements [`DocumentStore`] using
//! [sqlx](https://docs.rs/sqlx). Two tables hold the data:
//!
//! - `documents`: one row per chunk, with secondary indexes on `url`, `type`
//!   and `timestamp`.
//! - `embeddings`: one row per document, the vector stored as a BLOB of
//!   little-endian `f32`s.
//!
//! The schema is versioned through `PRAGMA user_version`. Migrations are
//! additive and each runs in its own transaction, so upgrading an existing
//! database keeps its rows.
//!
//! # Example
//!
//! ```rust,ignore
//! use devtools_rag::sqlite::SqliteDocumentStore;
//! use devtools_rag::{DocumentStore, SqliteStoreConfig};
//!
//! let store = SqliteDocumentStore::new(SqliteStoreConfig::new("context.db"));
//! store.open().await?;
//! println!("{} documents", store.count().await?);
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Connection, Row, SqliteConnection, SqlitePool};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::category::Category;
use crate::config::SqliteStoreConfig;
use crate::document::ContextDocument;
use crate::error::{StoreError, StoreErrorKind};
use crate::health::{HealthStep, StoreProbe};
use crate::store::{DocumentStore, LastErrorSlot, StoreContents, StoreResult, StoredEntry};

const BACKEND: &str = "sqlite";

/// Page size used when a quota is configured; the quota is expressed in pages.
const PAGE_SIZE: u32 = 4096;

/// Schema migrations, applied in order. Version `n` runs the statements of
/// `MIGRATIONS[n - 1]`.
const MIGRATIONS: &[&[&str]] = &[
    // v1: base tables and lookup indexes.
    &[
        "CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY NOT NULL,
            parent_id TEXT NOT NULL,
            content TEXT NOT NULL,
            type TEXT NOT NULL,
            category TEXT NOT NULL,
            url TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            timestamp INTEGER NOT NULL,
            chunk_index INTEGER NOT NULL DEFAULT 0,
            total_chunks INTEGER NOT NULL DEFAULT 1
        )",
        "CREATE INDEX IF NOT EXISTS idx_documents_url ON documents(url)",
        "CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(type)",
        "CREATE INDEX IF NOT EXISTS idx_documents_timestamp ON documents(timestamp)",
        "CREATE TABLE IF NOT EXISTS embeddings (
            document_id TEXT PRIMARY KEY NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            dimensions INTEGER NOT NULL,
            vector BLOB NOT NULL
        )",
    ],
    // v2: relevance and bookmarks.
    &[
        "ALTER TABLE documents ADD COLUMN relevance_score REAL NOT NULL DEFAULT 0.5",
        "ALTER TABLE documents ADD COLUMN bookmarked INTEGER NOT NULL DEFAULT 0",
    ],
];

/// Current schema version.
pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

const UPSERT_DOCUMENT: &str = "INSERT INTO documents \
        (id, parent_id, content, type, category, url, title, timestamp, \
         chunk_index, total_chunks, relevance_score, bookmarked) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
     ON CONFLICT(id) DO UPDATE SET \
        parent_id = excluded.parent_id, \
        content = excluded.content, \
        type = excluded.type, \
        category = excluded.category, \
        url = excluded.url, \
        title = excluded.title, \
        timestamp = excluded.timestamp, \
        chunk_index = excluded.chunk_index, \
        total_chunks = excluded.total_chunks, \
        relevance_score = excluded.relevance_score, \
        bookmarked = excluded.bookmarked";

const UPSERT_EMBEDDING: &str = "INSERT INTO embeddings (document_id, dimensions, vector) \
     VALUES (?, ?, ?) \
     ON CONFLICT(document_id) DO UPDATE SET \
        dimensions = excluded.dimensions, \
        vector = excluded.vector";

/// A [`DocumentStore`] backed by a SQLite database file.
pub struct SqliteDocumentStore {
    config: SqliteStoreConfig,
    pool: RwLock<Option<SqlitePool>>,
    last_error: LastErrorSlot,
}

impl SqliteDocumentStore {
    /// Create a store for the configured database. Nothing is opened until
    /// [`open`](DocumentStore::open) is called.
    pub fn new(config: SqliteStoreConfig) -> Self {
        Self { config, pool: RwLock::new(None), last_error: LastErrorSlot::new() }
    }

    pub fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    fn connect_options(&self, create: bool) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new()
            .filename(&self.config.path)
            .create_if_missing(create)
            .foreign_keys(true);
        match self.config.storage_quota_bytes {
            Some(bytes) => {
                let pages = (bytes / u64::from(PAGE_SIZE)).max(1);
                options
                    .page_size(PAGE_SIZE)
                    .journal_mode(SqliteJournalMode::Delete)
                    .pragma("max_page_count", pages.to_string())
            }
            None => options.journal_mode(SqliteJournalMode::Wal),
        }
    }

    fn fail(&self, operation: &str, e: sqlx::Error) -> StoreError {
        self.last_error.record(StoreError::new(classify(&e), operation, e.to_string()))
    }

    fn corrupt(&self, operation: &str, message: impl Into<String>) -> StoreError {
        self.last_error.record(StoreError::new(StoreErrorKind::Corrupt, operation, message))
    }

    async fn pool(&self, operation: &str) -> StoreResult<SqlitePool> {
        match self.pool.read().await.as_ref() {
            Some(pool) => Ok(pool.clone()),
            None => Err(self.last_error.record(StoreError::new(
                StoreErrorKind::Connection,
                operation,
                "store is not open",
            ))),
        }
    }

    async fn migrate(&self, pool: &SqlitePool) -> StoreResult<()> {
        let current: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(pool)
            .await
            .map_err(|e| self.fail("open", e))?;

        if current > SCHEMA_VERSION {
            return Err(self.last_error.record(StoreError::new(
                StoreErrorKind::VersionConflict,
                "open",
                format!("database schema v{current} is newer than supported v{SCHEMA_VERSION}"),
            )));
        }

        for (index, statements) in MIGRATIONS.iter().enumerate().skip(current.max(0) as usize) {
            let version = index as i64 + 1;
            let mut tx = pool.begin().await.map_err(|e| self.fail("migrate", e))?;
            for statement in statements.iter().copied() {
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| self.fail("migrate", e))?;
            }
            sqlx::query(&format!("PRAGMA user_version = {version}"))
                .execute(&mut *tx)
                .await
                .map_err(|e| self.fail("migrate", e))?;
            tx.commit().await.map_err(|e| self.fail("migrate", e))?;
            info!(from = current, to = version, "migrated context schema");
        }
        Ok(())
    }

    async fn write_entry(
        conn: &mut SqliteConnection,
        document: &ContextDocument,
        embedding: Option<&[f32]>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(UPSERT_DOCUMENT)
            .bind(&document.id)
            .bind(&document.parent_id)
            .bind(&document.content)
            .bind(&document.kind)
            .bind(document.category.label())
            .bind(&document.url)
            .bind(&document.title)
            .bind(document.timestamp.timestamp_millis())
            .bind(document.chunk_index as i64)
            .bind(document.total_chunks as i64)
            .bind(f64::from(document.relevance_score))
            .bind(document.bookmarked)
            .execute(&mut *conn)
            .await?;

        if let Some(embedding) = embedding {
            sqlx::query(UPSERT_EMBEDDING)
                .bind(&document.id)
                .bind(embedding.len() as i64)
                .bind(encode_embedding(embedding))
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SqliteDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDocumentStore").field("config", &self.config).finish_non_exhaustive()
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn open(&self) -> StoreResult<()> {
        let mut guard = self.pool.write().await;
        if guard.is_some() {
            return Ok(());
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(self.config.max_connections.max(1))
            .connect_with(self.connect_options(true))
            .await
            .map_err(|e| self.fail("open", e))?;

        if let Err(e) = self.migrate(&pool).await {
            pool.close().await;
            return Err(e);
        }

        debug!(path = %self.config.path.display(), "opened sqlite context store");
        *guard = Some(pool);
        Ok(())
    }

    async fn close(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
            debug!(path = %self.config.path.display(), "closed sqlite context store");
        }
    }

    async fn put_document(&self, document: &ContextDocument) -> StoreResult<()> {
        let pool = self.pool("put_document").await?;
        let mut conn = pool.acquire().await.map_err(|e| self.fail("put_document", e))?;
        Self::write_entry(&mut conn, document, None).await.map_err(|e| self.fail("put_document", e))
    }

    async fn put_embedding(&self, document_id: &str, embedding: &[f32]) -> StoreResult<()> {
        let pool = self.pool("put_embedding").await?;
        sqlx::query(UPSERT_EMBEDDING)
            .bind(document_id)
            .bind(embedding.len() as i64)
            .bind(encode_embedding(embedding))
            .execute(&pool)
            .await
            .map_err(|e| self.fail("put_embedding", e))?;
        Ok(())
    }

    async fn put_entries(&self, entries: &[StoredEntry]) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let pool = self.pool("put_entries").await?;
        let mut tx = pool.begin().await.map_err(|e| self.fail("put_entries", e))?;
        for entry in entries {
            Self::write_entry(&mut tx, &entry.document, Some(&entry.embedding))
                .await
                .map_err(|e| self.fail("put_entries", e))?;
        }
        tx.commit().await.map_err(|e| self.fail("put_entries", e))?;
        debug!(count = entries.len(), "stored context entries");
        Ok(())
    }

    async fn load_all(&self) -> StoreResult<StoreContents> {
        let pool = self.pool("load_all").await?;
        let mut tx = pool.begin().await.map_err(|e| self.fail("load_all", e))?;

        let rows = sqlx::query(
            "SELECT id, parent_id, content, type, category, url, title, timestamp, \
                    chunk_index, total_chunks, relevance_score, bookmarked \
             FROM documents ORDER BY timestamp, rowid",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| self.fail("load_all", e))?;

        let documents = rows
            .iter()
            .map(decode_document)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.fail("load_all", e))?;

        let rows = sqlx::query("SELECT document_id, dimensions, vector FROM embeddings")
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| self.fail("load_all", e))?;
        tx.commit().await.map_err(|e| self.fail("load_all", e))?;

        let mut embeddings = HashMap::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("document_id").map_err(|e| self.fail("load_all", e))?;
            let dimensions: i64 = row.try_get("dimensions").map_err(|e| self.fail("load_all", e))?;
            let blob: Vec<u8> = row.try_get("vector").map_err(|e| self.fail("load_all", e))?;
            let vector = decode_embedding(&blob, dimensions).ok_or_else(|| {
                self.corrupt("load_all", format!("embedding for '{id}' has a malformed vector"))
            })?;
            embeddings.insert(id, vector);
        }

        Ok(StoreContents { documents, embeddings })
    }

    async fn delete(&self, ids: &[&str]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let pool = self.pool("delete").await?;
        let mut tx = pool.begin().await.map_err(|e| self.fail("delete", e))?;
        let mut removed = 0;
        for id in ids {
            sqlx::query("DELETE FROM embeddings WHERE document_id = ?")
                .bind(*id)
                .execute(&mut *tx)
                .await
                .map_err(|e| self.fail("delete", e))?;
            let result = sqlx::query("DELETE FROM documents WHERE id = ?")
                .bind(*id)
                .execute(&mut *tx)
                .await
                .map_err(|e| self.fail("delete", e))?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(|e| self.fail("delete", e))?;
        Ok(removed)
    }

    async fn set_bookmark(&self, id: &str, bookmarked: bool) -> StoreResult<bool> {
        let pool = self.pool("set_bookmark").await?;
        let result = sqlx::query("UPDATE documents SET bookmarked = ? WHERE id = ?")
            .bind(bookmarked)
            .bind(id)
            .execute(&pool)
            .await
            .map_err(|e| self.fail("set_bookmark", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> StoreResult<usize> {
        let pool = self.pool("count").await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&pool)
            .await
            .map_err(|e| self.fail("count", e))?;
        Ok(count as usize)
    }

    async fn clear(&self) -> StoreResult<()> {
        let pool = self.pool("clear").await?;
        let mut tx = pool.begin().await.map_err(|e| self.fail("clear", e))?;
        sqlx::query("DELETE FROM embeddings")
            .execute(&mut *tx)
            .await
            .map_err(|e| self.fail("clear", e))?;
        sqlx::query("DELETE FROM documents")
            .execute(&mut *tx)
            .await
            .map_err(|e| self.fail("clear", e))?;
        tx.commit().await.map_err(|e| self.fail("clear", e))?;
        Ok(())
    }

    async fn replace_all(&self, entries: &[StoredEntry]) -> StoreResult<()> {
        let pool = self.pool("replace_all").await?;
        let mut tx = pool.begin().await.map_err(|e| self.fail("replace_all", e))?;
        for statement in ["DELETE FROM embeddings", "DELETE FROM documents"] {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| self.fail("replace_all", e))?;
        }
        for entry in entries {
            Self::write_entry(&mut tx, &entry.document, Some(&entry.embedding))
                .await
                .map_err(|e| self.fail("replace_all", e))?;
        }
        tx.commit().await.map_err(|e| self.fail("replace_all", e))?;
        debug!(count = entries.len(), "replaced context entries");
        Ok(())
    }

    async fn probe(&self) -> StoreResult<StoreProbe> {
        let mut conn = SqliteConnection::connect_with(&self.connect_options(false))
            .await
            .map_err(|e| self.fail(HealthStep::Initialize.as_str(), e))?;

        let result = async {
            let version: i64 = sqlx::query_scalar("PRAGMA user_version")
                .fetch_one(&mut conn)
                .await
                .map_err(|e| self.fail(HealthStep::ReadSchema.as_str(), e))?;
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
                .fetch_one(&mut conn)
                .await
                .map_err(|e| self.fail(HealthStep::ReadCount.as_str(), e))?;
            Ok::<_, StoreError>(StoreProbe {
                document_count: count as usize,
                schema_version: Some(version),
            })
        }
        .await;

        // A failed close does not change what the probe observed.
        let _ = conn.close().await;
        result
    }

    fn last_error(&self) -> Option<StoreError> {
        self.last_error.get()
    }

    fn clear_last_error(&self) {
        self.last_error.clear();
    }
}

/// Map a sqlx failure onto a [`StoreErrorKind`].
fn classify(e: &sqlx::Error) -> StoreErrorKind {
    match e {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // SQLITE_FULL
            Some("13") => StoreErrorKind::QuotaExceeded,
            // SQLITE_CORRUPT, SQLITE_NOTADB
            Some("11") | Some("26") => StoreErrorKind::Corrupt,
            // SQLITE_CANTOPEN
            Some("14") => StoreErrorKind::Connection,
            _ if db.message().contains("full") => StoreErrorKind::QuotaExceeded,
            _ => StoreErrorKind::Transaction,
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreErrorKind::Connection,
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StoreErrorKind::Corrupt,
        _ => StoreErrorKind::Transaction,
    }
}

fn decode_document(row: &SqliteRow) -> Result<ContextDocument, sqlx::Error> {
    let millis: i64 = row.try_get("timestamp")?;
    let timestamp =
        DateTime::from_timestamp_millis(millis).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "timestamp".into(),
            source: format!("timestamp {millis} is out of range").into(),
        })?;
    let category: String = row.try_get("category")?;
    let chunk_index: i64 = row.try_get("chunk_index")?;
    let total_chunks: i64 = row.try_get("total_chunks")?;
    let relevance: f64 = row.try_get("relevance_score")?;

    Ok(ContextDocument {
        id: row.try_get("id")?,
        parent_id: row.try_get("parent_id")?,
        content: row.try_get("content")?,
        kind: row.try_get("type")?,
        category: Category::parse(&category),
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        timestamp,
        chunk_index: chunk_index.max(0) as usize,
        total_chunks: total_chunks.max(1) as usize,
        relevance_score: relevance as f32,
        bookmarked: row.try_get("bookmarked")?,
    })
}

/// Encode a vector as little-endian `f32` bytes.
fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn decode_embedding(blob: &[u8], dimensions: i64) -> Option<Vec<f32>> {
    if dimensions < 0 || blob.len() != dimensions as usize * 4 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;

    fn store_in(dir: &TempDir) -> SqliteDocumentStore {
        SqliteDocumentStore::new(SqliteStoreConfig::new(dir.path().join("context.db")))
    }

    fn entry(id: &str, millis: i64) -> StoredEntry {
        StoredEntry {
            document: ContextDocument {
                id: id.into(),
                parent_id: "parent".into(),
                content: format!("body {id}"),
                kind: "network_request".into(),
                category: Category::Network,
                url: "https://app.test/".into(),
                title: "App".into(),
                timestamp: DateTime::from_timestamp_millis(millis).unwrap(),
                chunk_index: 0,
                total_chunks: 1,
                relevance_score: 0.75,
                bookmarked: false,
            },
            embedding: vec![0.25, -1.5, 3.0],
        }
    }

    #[test]
    fn embedding_blob_is_little_endian_f32() {
        let blob = encode_embedding(&[1.0, -2.5]);
        assert_eq!(blob.len(), 8);
        assert_eq!(&blob[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_embedding(&blob, 2), Some(vec![1.0, -2.5]));
        assert_eq!(decode_embedding(&blob, 3), None);
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.open().await.unwrap();
        store.open().await.unwrap();
        store.put_entries(&[entry("b", 2_000), entry("a", 1_000)]).await.unwrap();
        store.close().await;

        let reopened = store_in(&dir);
        reopened.open().await.unwrap();
        let contents = reopened.load_all().await.unwrap();
        let ids: Vec<_> = contents.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(contents.documents[0], entry("a", 1_000).document);
        assert_eq!(contents.embeddings["b"], vec![0.25, -1.5, 3.0]);
    }

    #[tokio::test]
    async fn delete_and_clear_remove_both_tables() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.open().await.unwrap();
        store.put_entries(&[entry("a", 1), entry("b", 2), entry("c", 3)]).await.unwrap();

        assert_eq!(store.delete(&["a", "zzz"]).await.unwrap(), 1);
        let contents = store.load_all().await.unwrap();
        assert_eq!(contents.documents.len(), 2);
        assert_eq!(contents.embeddings.len(), 2);

        assert!(store.set_bookmark("b", true).await.unwrap());
        assert!(!store.set_bookmark("a", true).await.unwrap());

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.load_all().await.unwrap().embeddings.is_empty());
    }

    #[tokio::test]
    async fn replace_all_swaps_contents_or_rolls_back() {
        let dir = TempDir::new().unwrap();
        let store = SqliteDocumentStore::new(
            SqliteStoreConfig::new(dir.path().join("small.db")).with_quota(64 * 1024),
        );
        store.open().await.unwrap();
        store.put_entries(&[entry("a", 1), entry("b", 2)]).await.unwrap();

        let mut oversized = entry("big", 3);
        oversized.document.content = (0..12_000).map(|i| format!("token{i} ")).collect();
        let err = store.replace_all(&[entry("c", 4), oversized]).await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(err.operation, "replace_all");
        let ids: Vec<_> =
            store.load_all().await.unwrap().documents.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        store.replace_all(&[entry("c", 4)]).await.unwrap();
        let contents = store.load_all().await.unwrap();
        assert_eq!(contents.documents.len(), 1);
        assert_eq!(contents.documents[0].id, "c");
        assert_eq!(contents.embeddings.keys().collect::<Vec<_>>(), vec!["c"]);
    }

    #[tokio::test]
    async fn embedding_without_document_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.open().await.unwrap();
        let err = store.put_embedding("ghost", &[1.0]).await.unwrap_err();
        assert_eq!(err.operation, "put_embedding");
        assert_eq!(store.last_error(), Some(err));
    }

    #[tokio::test]
    async fn v1_database_is_upgraded_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("context.db");
        {
            let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
            let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
            for statement in MIGRATIONS[0].iter().copied() {
                sqlx::query(statement).execute(&mut conn).await.unwrap();
            }
            sqlx::query("PRAGMA user_version = 1").execute(&mut conn).await.unwrap();
            sqlx::query(
                "INSERT INTO documents (id, parent_id, content, type, category, timestamp) \
                 VALUES ('old_chunk_0', 'old', 'legacy console line', 'CONSOLE', 'CONSOLE', ?)",
            )
            .bind(Utc::now().timestamp_millis())
            .execute(&mut conn)
            .await
            .unwrap();
            sqlx::query(
                "INSERT INTO embeddings (document_id, dimensions, vector) \
                 VALUES ('old_chunk_0', 2, ?)",
            )
            .bind(encode_embedding(&[0.6, 0.8]))
            .execute(&mut conn)
            .await
            .unwrap();
            conn.close().await.unwrap();
        }

        let store = SqliteDocumentStore::new(SqliteStoreConfig::new(&path));
        store.open().await.unwrap();
        let contents = store.load_all().await.unwrap();
        assert_eq!(contents.documents.len(), 1);
        let document = &contents.documents[0];
        assert_eq!(document.category, Category::Console);
        assert_eq!(document.relevance_score, 0.5);
        assert!(!document.bookmarked);
        assert_eq!(contents.embeddings["old_chunk_0"], vec![0.6, 0.8]);

        let probe = store.probe().await.unwrap();
        assert_eq!(probe.schema_version, Some(SCHEMA_VERSION));
    }

    #[tokio::test]
    async fn newer_schema_is_a_version_conflict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("context.db");
        {
            let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
            let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
            sqlx::query("PRAGMA user_version = 99").execute(&mut conn).await.unwrap();
            conn.close().await.unwrap();
        }

        let store = SqliteDocumentStore::new(SqliteStoreConfig::new(&path));
        let err = store.open().await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::VersionConflict);
        assert_eq!(store.last_error().map(|e| e.kind), Some(StoreErrorKind::VersionConflict));
        assert_eq!(store.count().await.unwrap_err().kind, StoreErrorKind::Connection);
    }

    #[tokio::test]
    async fn probe_of_missing_file_fails_at_initialize() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let err = store.probe().await.unwrap_err();
        assert_eq!(err.operation, "initialize");
    }
}
