//! Configuration for the context engine, its embedder and its store.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedding::DEFAULT_DIMENSIONS;
use crate::error::{RagError, Result};
use crate::openai::{DEFAULT_MAX_INPUT_CHARS, DEFAULT_TIMEOUT};
use crate::retrieval::DEFAULT_SEMANTIC_THRESHOLD;

/// Which embedding path the engine prefers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Only the deterministic local hash embedding.
    #[default]
    Local,
    /// The OpenAI embeddings API, with local fallback.
    #[serde(rename = "openai")]
    OpenAI,
}

impl EmbeddingProviderKind {
    /// Parse a provider name. Unknown names fall back to [`Local`](Self::Local).
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Self::OpenAI,
            _ => Self::Local,
        }
    }
}

/// Settings for the embedder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    /// API key for the remote provider. Without one the local path is used.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Per-request timeout for the remote provider.
    pub timeout: Duration,
    /// Longest input, in characters, sent to the remote provider.
    pub max_input_chars: usize,
    /// Drop stop words and one-letter tokens in the local embedding.
    pub drop_stop_words: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Local,
            api_key: None,
            model: None,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            drop_stop_words: true,
        }
    }
}

impl EmbeddingConfig {
    /// Read the embedder settings from the environment.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `DEVTOOLS_RAG_PROVIDER` | `provider` (`local` or `openai`) |
    /// | `OPENAI_API_KEY` | `api_key` |
    /// | `DEVTOOLS_RAG_EMBEDDING_MODEL` | `model` |
    /// | `DEVTOOLS_RAG_EMBEDDING_URL` | `base_url` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            provider: non_empty("DEVTOOLS_RAG_PROVIDER")
                .map(|p| EmbeddingProviderKind::parse(&p))
                .unwrap_or_default(),
            api_key: non_empty("OPENAI_API_KEY"),
            model: non_empty("DEVTOOLS_RAG_EMBEDDING_MODEL"),
            base_url: non_empty("DEVTOOLS_RAG_EMBEDDING_URL"),
            ..Self::default()
        }
    }

    /// Whether the remote path can be used at all.
    pub fn remote_enabled(&self) -> bool {
        self.provider == EmbeddingProviderKind::OpenAI
            && self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Settings for [`SqliteDocumentStore`](crate::sqlite::SqliteDocumentStore).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SqliteStoreConfig {
    /// Database file. Created on first open.
    pub path: PathBuf,
    /// Upper bound on the database size. Writes past it fail with
    /// [`StoreErrorKind::QuotaExceeded`](crate::StoreErrorKind::QuotaExceeded).
    #[serde(default)]
    pub storage_quota_bytes: Option<u64>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    4
}

impl SqliteStoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            storage_quota_bytes: None,
            max_connections: default_max_connections(),
        }
    }

    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.storage_quota_bytes = Some(bytes);
        self
    }
}

/// Configuration parameters for the [`ContextEngine`](crate::ContextEngine).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Length of every stored and query embedding.
    pub embedding_dimensions: usize,
    /// Upper bound on stored documents before count-based eviction.
    pub max_context_items: usize,
    /// Unbookmarked documents older than this are evicted.
    pub max_context_age: Duration,
    /// Result count for plain search when the caller passes zero.
    pub default_top_k: usize,
    /// Minimum similarity for category-aware search whose options leave it unset.
    pub semantic_threshold: f32,
    /// Cached query results before the oldest are dropped.
    pub cache_capacity: usize,
    /// How long a cached result stays valid.
    pub cache_ttl: Duration,
    pub embedding: EmbeddingConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            embedding_dimensions: DEFAULT_DIMENSIONS,
            max_context_items: 1000,
            max_context_age: Duration::from_secs(24 * 60 * 60),
            default_top_k: 5,
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            cache_capacity: 100,
            cache_ttl: Duration::from_secs(60),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl ContextConfig {
    /// Create a new builder for constructing a [`ContextConfig`].
    pub fn builder() -> ContextConfigBuilder {
        ContextConfigBuilder::default()
    }

    /// Check that the parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any size is zero or `semantic_threshold`
    /// lies outside `[-1, 1]`.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("chunk_size", self.chunk_size),
            ("embedding_dimensions", self.embedding_dimensions),
            ("max_context_items", self.max_context_items),
            ("cache_capacity", self.cache_capacity),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(RagError::Config(format!("{name} must be greater than zero")));
        }
        if !(-1.0..=1.0).contains(&self.semantic_threshold) {
            return Err(RagError::Config(format!(
                "semantic_threshold ({}) must be within [-1, 1]",
                self.semantic_threshold
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`ContextConfig`].
#[derive(Debug, Clone, Default)]
pub struct ContextConfigBuilder {
    config: ContextConfig,
}

impl ContextConfigBuilder {
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.config.embedding_dimensions = dimensions;
        self
    }

    pub fn max_context_items(mut self, items: usize) -> Self {
        self.config.max_context_items = items;
        self
    }

    pub fn max_context_age(mut self, age: Duration) -> Self {
        self.config.max_context_age = age;
        self
    }

    pub fn default_top_k(mut self, k: usize) -> Self {
        self.config.default_top_k = k;
        self
    }

    pub fn semantic_threshold(mut self, threshold: f32) -> Self {
        self.config.semantic_threshold = threshold;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    pub fn embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.config.embedding = embedding;
        self
    }

    /// Build the [`ContextConfig`], validating it first.
    pub fn build(self) -> Result<ContextConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
