//! Context engine orchestrator.
//!
//! The [`ContextEngine`] owns a [`DocumentStore`] and an in-memory mirror of
//! its contents. Ingestion runs chunk → embed → store → refresh mirror;
//! searches read the mirror only. Mutations are serialized, and every one of
//! them reloads the mirror and clears the search cache before it returns, so a
//! search issued after a write resolves observes that write.
//!
//! # Example
//!
//! ```rust,ignore
//! use devtools_rag::{ContextEngine, ContextRecord, InMemoryDocumentStore};
//!
//! let engine = ContextEngine::builder()
//!     .store(Arc::new(InMemoryDocumentStore::new()))
//!     .build()?;
//! engine.open().await?;
//! engine.add_document(ContextRecord::new("CONSOLE", "TypeError: x is undefined")).await?;
//! let results = engine.search("undefined", 5).await;
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::SearchCache;
use crate::category::Category;
use crate::chunking::{Chunker, WordBoundaryChunker};
use crate::config::ContextConfig;
use crate::document::{ContextDocument, ContextRecord, DocumentMetadata, SearchResult};
use crate::embedding::{EmbeddingProvider, FallbackEmbedder, HashEmbedder};
use crate::error::{RagError, Result, StoreError};
use crate::health::{self, EmbeddingServiceStatus, HealthReport, ServiceState};
use crate::insights::{self, ContextStatistics, PatternReport, SummaryOptions};
use crate::lifecycle::{
    self, ContextSnapshot, ExportOptions, ExportedDocument, ImportMode, ImportSummary,
};
use crate::openai::OpenAIEmbeddingProvider;
use crate::retrieval::{self, SearchOptions};
use crate::store::{DocumentStore, StoredEntry};

/// Index-aligned copy of the store: `embeddings[i]` belongs to `documents[i]`.
#[derive(Debug, Default)]
struct Mirror {
    open: bool,
    documents: Vec<ContextDocument>,
    embeddings: Vec<Vec<f32>>,
}

impl Mirror {
    fn pairs(&self) -> impl Iterator<Item = (&ContextDocument, &[f32])> {
        self.documents.iter().zip(self.embeddings.iter().map(Vec::as_slice))
    }
}

struct Ingested {
    parent_id: String,
    chunk_ids: Vec<String>,
}

/// The context engine.
///
/// Construct one via [`ContextEngine::builder()`], then call
/// [`open`](Self::open) before use. Share it behind an `Arc`.
pub struct ContextEngine {
    config: ContextConfig,
    store: Arc<dyn DocumentStore>,
    embedder: FallbackEmbedder,
    chunker: Arc<dyn Chunker>,
    mirror: RwLock<Mirror>,
    cache: Mutex<SearchCache>,
    writes: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ContextEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextEngine")
            .field("config", &self.config)
            .field("store", &self.store.backend())
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

impl ContextEngine {
    /// Create a new [`ContextEngineBuilder`].
    pub fn builder() -> ContextEngineBuilder {
        ContextEngineBuilder::default()
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn embedder(&self) -> &FallbackEmbedder {
        &self.embedder
    }

    fn cache(&self) -> MutexGuard<'_, SearchCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the store and load the mirror. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Store`] if the store cannot be opened or read.
    pub async fn open(&self) -> Result<()> {
        let _write = self.writes.lock().await;
        self.store.open().await?;
        self.reload().await?;
        let document_count = self.document_count().await;
        info!(backend = self.store.backend(), document_count, "context engine opened");
        Ok(())
    }

    /// Close the store and drop the mirror. Later calls fail with
    /// [`RagError::NotOpen`] until [`open`](Self::open) is called again.
    pub async fn close(&self) {
        let _write = self.writes.lock().await;
        let mut mirror = self.mirror.write().await;
        *mirror = Mirror::default();
        self.cache().clear();
        drop(mirror);
        self.store.close().await;
        info!(backend = self.store.backend(), "context engine closed");
    }

    pub async fn is_open(&self) -> bool {
        self.mirror.read().await.open
    }

    async fn ensure_open(&self) -> Result<()> {
        if self.is_open().await { Ok(()) } else { Err(RagError::NotOpen) }
    }

    /// Replace the mirror with the store's contents and clear the cache.
    async fn reload(&self) -> Result<()> {
        let contents = self.store.load_all().await?;
        let (documents, embeddings, orphans) = contents.into_aligned();
        if !orphans.is_empty() {
            warn!(count = orphans.len(), "skipping stored documents without an embedding");
        }

        let mut mirror = self.mirror.write().await;
        mirror.open = true;
        mirror.documents = documents;
        mirror.embeddings = embeddings;
        self.cache().clear();
        debug!(document_count = mirror.documents.len(), "refreshed context mirror");
        Ok(())
    }

    /// Bring the mirror back in line with the store after a failed write and
    /// return the failure.
    async fn resync(&self, err: StoreError) -> RagError {
        if let Err(reload) = self.reload().await {
            warn!(error = %reload, "failed to refresh context mirror after a failed write");
        }
        RagError::from(err)
    }

    /// Evict with the configured limits if the mirror holds more than
    /// `max_context_items` documents. Returns the number removed.
    async fn enforce_item_limit(&self) -> Result<usize> {
        if self.mirror.read().await.documents.len() <= self.config.max_context_items {
            return Ok(0);
        }
        self.evict_locked(self.config.max_context_age, self.config.max_context_items).await
    }

    // ── Ingestion ──────────────────────────────────────────────────────

    /// Ingest a captured record: chunk → embed → store.
    ///
    /// All chunks are written in one store transaction. Returns the ids of the
    /// stored chunks; empty or whitespace-only content stores nothing. If the
    /// store now holds more than `max_context_items` documents, eviction runs.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Store`] if the write fails, and
    /// [`RagError::NotOpen`] before [`open`](Self::open).
    pub async fn add_document(&self, record: ContextRecord) -> Result<Vec<String>> {
        Ok(self.ingest(record).await?.chunk_ids)
    }

    /// Ingest `content` under explicit metadata. Returns the parent id shared
    /// by all stored chunks.
    pub async fn add_categorized_document(
        &self,
        content: impl Into<String>,
        metadata: DocumentMetadata,
    ) -> Result<String> {
        Ok(self.ingest(metadata.into_record(content)).await?.parent_id)
    }

    async fn ingest(&self, record: ContextRecord) -> Result<Ingested> {
        let _write = self.writes.lock().await;
        self.ensure_open().await?;

        let parent_id = format!("ctx_{}", Uuid::new_v4().simple());
        let chunks = self.chunker.chunk(&record.content);
        if chunks.is_empty() {
            debug!(document.id = %parent_id, chunk_count = 0, "ingested document (empty)");
            return Ok(Ingested { parent_id, chunk_ids: Vec::new() });
        }

        let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&texts).await;

        let timestamp = record.timestamp.unwrap_or_else(Utc::now);
        let category = record.resolved_category();
        let relevance_score = record.resolved_relevance();
        let total_chunks = chunks.len();

        let entries: Vec<StoredEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (content, embedding))| StoredEntry {
                document: ContextDocument {
                    id: format!("{parent_id}_chunk_{chunk_index}"),
                    parent_id: parent_id.clone(),
                    content,
                    kind: record.kind.clone(),
                    category: category.clone(),
                    url: record.url.clone(),
                    title: record.title.clone(),
                    timestamp,
                    chunk_index,
                    total_chunks,
                    relevance_score,
                    bookmarked: record.bookmarked,
                },
                embedding,
            })
            .collect();

        if let Err(e) = self.store.put_entries(&entries).await {
            error!(document.id = %parent_id, error = %e, "failed to store document");
            return Err(self.resync(e).await);
        }
        self.reload().await?;

        let chunk_ids = entries.into_iter().map(|entry| entry.document.id).collect();
        info!(document.id = %parent_id, chunk_count = total_chunks, %category, "ingested document");

        self.enforce_item_limit().await?;

        Ok(Ingested { parent_id, chunk_ids })
    }

    // ── Retrieval ──────────────────────────────────────────────────────

    /// Plain search: the `top_k` most similar documents, scored by similarity
    /// alone. A `top_k` of zero uses the configured default.
    ///
    /// Reads the mirror only, so it never fails; before `open` it is empty.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        let top_k = if top_k == 0 { self.config.default_top_k } else { top_k };
        let key = SearchCache::key(query, &("plain", top_k));
        if let Some(hit) = self.cache().get(&key) {
            debug!(top_k, result_count = hit.len(), "search served from cache");
            return hit;
        }

        let query_embedding = self.embedder.embed(query).await;
        let mirror = self.mirror.read().await;
        let results = retrieval::rank_by_similarity(&query_embedding, mirror.pairs(), top_k);
        // Cached while the mirror is still locked, so a concurrent write clears it afterwards.
        self.cache().insert(key, results.clone());
        debug!(top_k, result_count = results.len(), "search completed");
        results
    }

    /// Search options seeded with the configured semantic threshold.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions::default().semantic_threshold(self.config.semantic_threshold)
    }

    /// Category-aware search weighted by category, relevance and recency.
    ///
    /// Options without a semantic threshold use the configured one.
    pub async fn search_with_categories(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Vec<SearchResult> {
        let mut resolved = options.clone();
        resolved.semantic_threshold.get_or_insert(self.config.semantic_threshold);
        let key = SearchCache::key(query, &resolved);
        if let Some(hit) = self.cache().get(&key) {
            debug!(result_count = hit.len(), "category search served from cache");
            return hit;
        }

        let query_embedding = self.embedder.embed(query).await;
        let mirror = self.mirror.read().await;
        let results =
            retrieval::score_candidates(&query_embedding, mirror.pairs(), &resolved, Utc::now());
        self.cache().insert(key, results.clone());
        debug!(
            categories = ?resolved.categories,
            result_count = results.len(),
            "category search completed"
        );
        results
    }

    /// Number of documents in the mirror.
    pub async fn document_count(&self) -> usize {
        self.mirror.read().await.documents.len()
    }

    pub async fn documents_by_category(&self, category: &Category) -> Vec<ContextDocument> {
        let mirror = self.mirror.read().await;
        mirror.documents.iter().filter(|doc| &doc.category == category).cloned().collect()
    }

    pub async fn documents_by_url(&self, url: &str) -> Vec<ContextDocument> {
        let mirror = self.mirror.read().await;
        mirror.documents.iter().filter(|doc| doc.url == url).cloned().collect()
    }

    /// The `limit` most recently captured documents, newest first.
    pub async fn recent_documents(&self, limit: usize) -> Vec<ContextDocument> {
        let mut documents = self.mirror.read().await.documents.clone();
        documents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        documents.truncate(limit);
        documents
    }

    // ── Mutation and lifecycle ─────────────────────────────────────────

    /// Set or clear the bookmark on a document. Returns `false` if no document
    /// has that id.
    pub async fn set_bookmark(&self, id: &str, bookmarked: bool) -> Result<bool> {
        let _write = self.writes.lock().await;
        self.ensure_open().await?;
        let found = match self.store.set_bookmark(id, bookmarked).await {
            Ok(found) => found,
            Err(e) => return Err(self.resync(e).await),
        };
        if found {
            self.reload().await?;
            debug!(document.id = %id, bookmarked, "updated bookmark");
        }
        Ok(found)
    }

    /// Evict with the configured limits, or with `max_age` when given.
    /// Returns the number of removed documents.
    pub async fn cleanup_old_context(&self, max_age: Option<Duration>) -> Result<usize> {
        self.evict(max_age.unwrap_or(self.config.max_context_age), self.config.max_context_items)
            .await
    }

    /// Remove unbookmarked documents older than `max_age`, then the oldest
    /// unbookmarked documents until at most `max_count` remain. Embeddings go
    /// with their documents. The search cache is always cleared.
    pub async fn evict(&self, max_age: Duration, max_count: usize) -> Result<usize> {
        let _write = self.writes.lock().await;
        self.evict_locked(max_age, max_count).await
    }

    async fn evict_locked(&self, max_age: Duration, max_count: usize) -> Result<usize> {
        self.ensure_open().await?;
        let ids = {
            let mirror = self.mirror.read().await;
            lifecycle::plan_eviction(&mirror.documents, Utc::now(), max_age, max_count)
        };
        self.cache().clear();
        if ids.is_empty() {
            return Ok(0);
        }

        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let removed = match self.store.delete(&id_refs).await {
            Ok(removed) => removed,
            Err(e) => return Err(self.resync(e).await),
        };
        self.reload().await?;
        info!(removed, max_age_secs = max_age.as_secs(), max_count, "evicted context");
        Ok(removed)
    }

    /// Remove every document and embedding.
    pub async fn clear(&self) -> Result<()> {
        let _write = self.writes.lock().await;
        self.ensure_open().await?;
        if let Err(e) = self.store.clear().await {
            return Err(self.resync(e).await);
        }
        self.reload().await?;
        info!("cleared all context");
        Ok(())
    }

    /// Produce a backup of the mirror. Does not modify any state.
    pub async fn export_context_data(&self, options: &ExportOptions) -> Result<ContextSnapshot> {
        let mirror = self.mirror.read().await;
        if !mirror.open {
            return Err(RagError::NotOpen);
        }
        let now = Utc::now();
        let documents = mirror
            .pairs()
            .filter(|(document, _)| options.admits(document, now))
            .map(|(document, embedding)| ExportedDocument {
                document: document.clone(),
                embedding: options.include_embeddings.then(|| embedding.to_vec()),
            })
            .collect();
        Ok(ContextSnapshot::new(documents))
    }

    /// Re-persist a snapshot produced by
    /// [`export_context_data`](Self::export_context_data).
    ///
    /// Documents without an exported embedding, or with one of the wrong
    /// length, are embedded again. Documents with no id or no content are
    /// skipped. A replacing import swaps the store contents atomically, so a
    /// failed one leaves the previous context in place. Afterwards the item
    /// limit is enforced as after ingestion.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Snapshot`] for an inconsistent snapshot and
    /// [`RagError::Store`] if the write fails.
    pub async fn import_context_data(
        &self,
        snapshot: ContextSnapshot,
        mode: ImportMode,
    ) -> Result<ImportSummary> {
        let _write = self.writes.lock().await;
        self.ensure_open().await?;
        snapshot.validate()?;

        let dimensions = self.embedder.dimensions();
        let mut summary = ImportSummary::default();
        let mut entries = Vec::with_capacity(snapshot.documents.len());
        for exported in snapshot.documents {
            let ExportedDocument { document, embedding } = exported;
            if document.id.trim().is_empty() || document.content.trim().is_empty() {
                summary.skipped += 1;
                continue;
            }
            let embedding = match embedding {
                Some(embedding) if embedding.len() == dimensions => embedding,
                _ => {
                    summary.reembedded += 1;
                    self.embedder.embed(&document.content).await
                }
            };
            entries.push(StoredEntry { document, embedding });
        }

        let written = match mode {
            ImportMode::Replace => self.store.replace_all(&entries).await,
            ImportMode::Merge => self.store.put_entries(&entries).await,
        };
        if let Err(e) = written {
            error!(error = %e, ?mode, "failed to import context snapshot");
            return Err(self.resync(e).await);
        }
        summary.imported = entries.len();
        self.reload().await?;
        summary.evicted = self.enforce_item_limit().await?;

        info!(
            imported = summary.imported,
            reembedded = summary.reembedded,
            skipped = summary.skipped,
            evicted = summary.evicted,
            ?mode,
            "imported context snapshot"
        );
        Ok(summary)
    }

    // ── Diagnostics ────────────────────────────────────────────────────

    /// Probe the store afresh. Never fails; problems are reported in the result.
    pub async fn check_health(&self) -> HealthReport {
        health::check_health(self.store.as_ref()).await
    }

    /// Connectivity of the remote embedding service, if one is configured.
    pub async fn embedding_status(&self) -> EmbeddingServiceStatus {
        match self.embedder.primary() {
            Some(primary) => primary.status().await,
            None => EmbeddingServiceStatus::new(ServiceState::Info, "Local embeddings"),
        }
    }

    pub fn last_error(&self) -> Option<StoreError> {
        self.store.last_error()
    }

    pub fn clear_last_error(&self) {
        self.store.clear_last_error();
    }

    // ── Insights ───────────────────────────────────────────────────────

    /// Category-grouped context for an LLM prompt, bounded by
    /// `options.max_context_length`.
    pub async fn context_summary(&self, query: &str, options: &SummaryOptions) -> String {
        let results = self.search_with_categories(query, &options.search_options()).await;
        insights::summarize(&results, options)
    }

    pub async fn analyze_patterns(&self) -> PatternReport {
        insights::analyze_patterns(&self.mirror.read().await.documents, Utc::now())
    }

    pub async fn statistics(&self) -> ContextStatistics {
        insights::statistics(&self.mirror.read().await.documents, Utc::now())
    }
}

/// Builder for constructing a [`ContextEngine`].
///
/// Only the store is required. Without an explicit embedding provider, an
/// OpenAI provider is created when the configuration enables one; the local
/// hash embedding is always the fallback.
///
/// # Example
///
/// ```rust,ignore
/// let engine = ContextEngine::builder()
///     .config(ContextConfig::default())
///     .store(Arc::new(SqliteDocumentStore::new(SqliteStoreConfig::new("context.db"))))
///     .embedding_provider(Arc::new(provider))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct ContextEngineBuilder {
    config: Option<ContextConfig>,
    store: Option<Arc<dyn DocumentStore>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl ContextEngineBuilder {
    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the remote embedding provider tried before the local fallback.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Replace the default [`WordBoundaryChunker`].
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`ContextEngine`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the store is missing or the
    /// configuration is invalid, and [`RagError::Embedding`] if a configured
    /// remote provider cannot be created.
    pub fn build(self) -> Result<ContextEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let store = self.store.ok_or_else(|| RagError::Config("store is required".to_string()))?;

        let dimensions = config.embedding_dimensions;
        let fallback = HashEmbedder::new(dimensions)
            .with_stop_words_dropped(config.embedding.drop_stop_words);

        let primary = match self.embedding_provider {
            Some(provider) => Some(provider),
            None if config.embedding.remote_enabled() => Some(Arc::new(
                OpenAIEmbeddingProvider::from_config(&config.embedding, dimensions)?,
            ) as Arc<dyn EmbeddingProvider>),
            None => None,
        };
        if let Some(provider) = &primary {
            if provider.dimensions() != dimensions {
                warn!(
                    provider = provider.name(),
                    provider_dimensions = provider.dimensions(),
                    dimensions,
                    "embedding provider dimensionality differs; its vectors will be replaced locally"
                );
            }
        }
        let embedder = match primary {
            Some(primary) => FallbackEmbedder::with_primary(primary, fallback),
            None => FallbackEmbedder::local(fallback),
        };

        let chunker = self
            .chunker
            .unwrap_or_else(|| Arc::new(WordBoundaryChunker::new(config.chunk_size)));
        let cache = SearchCache::new(config.cache_capacity, config.cache_ttl);

        Ok(ContextEngine {
            config,
            store,
            embedder,
            chunker,
            mirror: RwLock::new(Mirror::default()),
            cache: Mutex::new(cache),
            writes: tokio::sync::Mutex::new(()),
        })
    }
}
