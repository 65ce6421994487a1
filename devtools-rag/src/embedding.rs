//! Embedding providers.
//!
//! [`EmbeddingProvider`] is the seam for remote embedding services. Remote
//! calls return explicit errors; [`FallbackEmbedder`] is the orchestrator that
//! catches them and degrades to the deterministic [`HashEmbedder`], so
//! embedding always succeeds from the caller's point of view.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::health::{EmbeddingServiceStatus, ServiceState};

/// Dimensionality of the local fallback embedding.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Weight of the word-order component mixed into each token's contribution.
const POSITION_WEIGHT: f64 = 0.1;

/// Tokens dropped by [`HashEmbedder`] when stop-word filtering is enabled.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "in",
    "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "will",
    "with",
];

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use devtools_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Report whether the backing service is reachable. Providers without a
    /// remote service report [`ServiceState::Info`].
    async fn status(&self) -> EmbeddingServiceStatus {
        EmbeddingServiceStatus::new(ServiceState::Info, format!("{} embeddings", self.name()))
    }
}

/// Deterministic, dependency-free embedding computed from token hashes.
///
/// Text is lowercased and split into ASCII word tokens. Each token is hashed
/// with a 32-bit rolling hash and contributes a sinusoidal signature over the
/// vector, plus a small component that depends on the token's position. The
/// result is L2-normalized; text with no tokens maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
    drop_stop_words: bool,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashEmbedder {
    /// Create an embedder producing `dimensions`-long vectors, with stop-word
    /// filtering enabled.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, drop_stop_words: true }
    }

    /// Enable or disable stop-word filtering.
    pub fn with_stop_words_dropped(mut self, drop: bool) -> Self {
        self.drop_stop_words = drop;
        self
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Split text into the tokens that contribute to its embedding.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|token| !token.is_empty())
            .filter(|token| {
                !self.drop_stop_words || (token.len() > 1 && !STOP_WORDS.contains(token))
            })
            .map(str::to_string)
            .collect()
    }

    /// Compute the embedding for `text`. Never fails.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut acc = vec![0.0f64; self.dimensions];

        for (position, token) in self.tokenize(text).iter().enumerate() {
            let hash = f64::from(token_hash(token));
            let position = position as f64;
            for (i, slot) in acc.iter_mut().enumerate() {
                let i = i as f64;
                *slot += (hash + i).sin() * (hash * i).cos()
                    + POSITION_WEIGHT * (hash * i + position).sin();
            }
        }

        let magnitude = acc.iter().map(|v| v * v).sum::<f64>().sqrt();
        if magnitude == 0.0 {
            return vec![0.0; self.dimensions];
        }
        acc.iter().map(|v| (v / magnitude) as f32).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "local-hash"
    }
}

/// 32-bit rolling hash (`h = h * 31 + c`) over UTF-16 code units.
fn token_hash(token: &str) -> i32 {
    token.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(i32::from(unit))
    })
}

/// Embeds through an optional remote provider, falling back to a local
/// [`HashEmbedder`] when the provider is absent, fails, or returns a vector of
/// the wrong dimensionality.
#[derive(Clone)]
pub struct FallbackEmbedder {
    primary: Option<Arc<dyn EmbeddingProvider>>,
    fallback: HashEmbedder,
}

impl std::fmt::Debug for FallbackEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackEmbedder")
            .field("primary", &self.primary.as_ref().map(|p| p.name().to_string()))
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl FallbackEmbedder {
    /// Create an embedder that only uses the local fallback.
    pub fn local(fallback: HashEmbedder) -> Self {
        Self { primary: None, fallback }
    }

    /// Create an embedder that tries `primary` first.
    pub fn with_primary(primary: Arc<dyn EmbeddingProvider>, fallback: HashEmbedder) -> Self {
        Self { primary: Some(primary), fallback }
    }

    /// The dimensionality every returned vector has.
    pub fn dimensions(&self) -> usize {
        self.fallback.dimensions()
    }

    /// The configured remote provider, if any.
    pub fn primary(&self) -> Option<&Arc<dyn EmbeddingProvider>> {
        self.primary.as_ref()
    }

    /// Embed `text`. Remote failures are logged and answered locally.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        if let Some(primary) = &self.primary {
            match self.try_primary(primary.as_ref(), text).await {
                Ok(vector) => return vector,
                Err(e) => {
                    warn!(
                        provider = primary.name(),
                        error = %e,
                        "remote embedding failed, using local fallback"
                    );
                }
            }
        }
        debug!(text_len = text.len(), "embedding locally");
        self.fallback.embed_text(text)
    }

    /// Embed each of `texts`, preferring one batched remote call.
    pub async fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        if let Some(primary) = &self.primary {
            match primary.embed_batch(texts).await {
                Ok(vectors)
                    if vectors.len() == texts.len()
                        && vectors.iter().all(|v| v.len() == self.dimensions()) =>
                {
                    return vectors;
                }
                Ok(vectors) => {
                    warn!(
                        provider = primary.name(),
                        returned = vectors.len(),
                        expected = texts.len(),
                        "remote batch had the wrong shape, using local fallback"
                    );
                }
                Err(e) => {
                    warn!(
                        provider = primary.name(),
                        error = %e,
                        "remote batch embedding failed, using local fallback"
                    );
                }
            }
        }
        texts.iter().map(|text| self.fallback.embed_text(text)).collect()
    }

    async fn try_primary(&self, primary: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
        let vector = primary.embed(text).await?;
        if vector.len() != self.dimensions() {
            return Err(RagError::Embedding {
                provider: primary.name().to_string(),
                message: format!(
                    "expected {} dimensions, got {}",
                    self.dimensions(),
                    vector.len()
                ),
            });
        }
        Ok(vector)
    }
}
