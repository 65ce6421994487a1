//! # devtools-rag
//!
//! Persistent, local retrieval store for a DevTools AI assistant.
//!
//! ## Overview
//!
//! Page-context collaborators (DOM capture, network monitor, console hooks)
//! push text records into a [`ContextEngine`]. The engine splits them with a
//! [`Chunker`], embeds every chunk through a [`FallbackEmbedder`], writes
//! each (document, embedding) pair to a [`DocumentStore`] and answers
//! nearest-neighbour queries against an in-memory mirror of the store.
//!
//! - [`WordBoundaryChunker`] - bounded, word-respecting chunks
//! - [`HashEmbedder`] - deterministic local embedding
//! - [`OpenAIEmbeddingProvider`] - remote embedding with local fallback
//! - [`SqliteDocumentStore`] - durable store with versioned schema and quota
//! - [`InMemoryDocumentStore`] - volatile store for tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use devtools_rag::{
//!     ContextEngine, ContextRecord, SearchOptions, SqliteDocumentStore, SqliteStoreConfig,
//! };
//!
//! let store = SqliteDocumentStore::new(SqliteStoreConfig::new("context.db"));
//! let engine = ContextEngine::builder().store(Arc::new(store)).build()?;
//! engine.open().await?;
//!
//! let record = ContextRecord::new("CONSOLE", "TypeError: x is undefined").with_relevance(0.9);
//! engine.add_document(record).await?;
//!
//! let options = SearchOptions::default().with_categories(["CONSOLE"]).max_results(2);
//! for result in engine.search_with_categories("undefined error", &options).await {
//!     println!("{:.3} {}", result.score, result.document.content);
//! }
//! ```
//!
//! ## Failure model
//!
//! Embedding never fails: remote errors are logged and the local embedding is
//! used. Store failures are returned as [`RagError::Store`] and also kept as
//! the store's last error; [`RagError::user_message`] gives a UI-safe text.

pub mod cache;
pub mod category;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod health;
pub mod inmemory;
pub mod insights;
pub mod lifecycle;
pub mod openai;
pub mod retrieval;
pub mod sqlite;
pub mod store;
pub mod telemetry;

pub use cache::SearchCache;
pub use category::Category;
pub use chunking::{Chunker, WordBoundaryChunker, chunk_text};
pub use config::{
    ContextConfig, ContextConfigBuilder, EmbeddingConfig, EmbeddingProviderKind, SqliteStoreConfig,
};
pub use document::{ContextDocument, ContextRecord, DocumentMetadata, SearchResult};
pub use embedding::{EmbeddingProvider, FallbackEmbedder, HashEmbedder};
pub use engine::{ContextEngine, ContextEngineBuilder};
pub use error::{RagError, Result, StoreError, StoreErrorKind};
pub use health::{EmbeddingServiceStatus, HealthReport, HealthStep, ServiceState};
pub use inmemory::InMemoryDocumentStore;
pub use insights::{ContextStatistics, PatternReport, SummaryOptions};
pub use lifecycle::{ContextSnapshot, ExportOptions, ImportMode, ImportSummary};
pub use openai::OpenAIEmbeddingProvider;
pub use retrieval::{SearchOptions, cosine_similarity, recency_boost};
pub use sqlite::SqliteDocumentStore;
pub use store::{DocumentStore, StoreContents, StoredEntry};
