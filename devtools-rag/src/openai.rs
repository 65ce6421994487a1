//! OpenAI embedding provider using the OpenAI embeddings API.
//!
//! This is the remote path of the embedder. Any OpenAI-compatible endpoint
//! works by overriding the base URL.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::EmbeddingConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::health::{EmbeddingServiceStatus, ServiceState};

/// The default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Longest input, in characters, sent to the service.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 8000;

/// The default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const PROVIDER: &str = "OpenAI";

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// Requests ask for `dimensions`-long vectors (Matryoshka truncation) so the
/// remote and local embedders agree on dimensionality. Input is truncated to
/// `max_input_chars` characters and every request is bounded by a timeout, so
/// a hung service degrades to the local fallback promptly.
///
/// # Example
///
/// ```rust,ignore
/// use devtools_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...", 384)?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    max_input_chars: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key and output dimensionality.
    pub fn new(api_key: impl Into<String>, dimensions: usize) -> Result<Self> {
        Self::build(api_key.into(), OPENAI_BASE_URL.into(), DEFAULT_TIMEOUT, dimensions)
    }

    /// Create a provider from an [`EmbeddingConfig`].
    pub fn from_config(config: &EmbeddingConfig, dimensions: usize) -> Result<Self> {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = config.base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string());
        let mut provider = Self::build(api_key, base_url, config.timeout, dimensions)?;
        provider.max_input_chars = config.max_input_chars;
        if let Some(model) = &config.model {
            provider.model = model.clone();
        }
        Ok(provider)
    }

    fn build(
        api_key: String,
        base_url: String,
        timeout: Duration,
        dimensions: usize,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(RagError::Embedding {
                provider: PROVIDER.into(),
                message: "API key must not be empty".into(),
            });
        }

        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            RagError::Embedding {
                provider: PROVIDER.into(),
                message: format!("failed to build HTTP client: {e}"),
            }
        })?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.into(),
            dimensions,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        })
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the provider at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The model requests are sent to.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn truncate<'a>(&self, text: &'a str) -> &'a str {
        match text.char_indices().nth(self.max_input_chars) {
            Some((byte_index, _)) => &text[..byte_index],
            None => text,
        }
    }

    fn request_error(e: reqwest::Error) -> RagError {
        error!(provider = PROVIDER, error = %e, "request failed");
        RagError::Embedding { provider: PROVIDER.into(), message: format!("request failed: {e}") }
    }

    /// Probe the service with `GET {base_url}/models`.
    pub async fn check_status(&self) -> EmbeddingServiceStatus {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                EmbeddingServiceStatus::new(ServiceState::Ok, "OpenAI Connected")
            }
            Ok(response) if response.status() == reqwest::StatusCode::UNAUTHORIZED => {
                EmbeddingServiceStatus::new(
                    ServiceState::Error,
                    "OpenAI Connection Failed: Invalid API Key",
                )
            }
            Ok(response) => EmbeddingServiceStatus::new(
                ServiceState::Error,
                format!("OpenAI Connection Failed: {}", response.status()),
            ),
            Err(e) if e.is_connect() || e.is_timeout() => EmbeddingServiceStatus::new(
                ServiceState::Error,
                "OpenAI Connection Failed: Network Error",
            ),
            Err(e) => {
                error!(provider = PROVIDER, error = %e, "status check failed");
                EmbeddingServiceStatus::new(ServiceState::Error, "OpenAI Connection Failed")
            }
        }
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::Embedding {
            provider: PROVIDER.into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.iter().map(|text| self.truncate(text)).collect(),
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(Self::request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::Embedding {
                provider: PROVIDER.into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::Embedding {
                provider: PROVIDER.into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        Ok(embedding_response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    async fn status(&self) -> EmbeddingServiceStatus {
        self.check_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        assert!(OpenAIEmbeddingProvider::new("", 384).is_err());
    }

    #[test]
    fn truncates_on_char_boundaries() {
        let mut provider = OpenAIEmbeddingProvider::new("sk-test", 384).unwrap();
        provider.max_input_chars = 3;
        assert_eq!(provider.truncate("héllo"), "hél");
        assert_eq!(provider.truncate("hi"), "hi");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = OpenAIEmbeddingProvider::new("sk-test", 384)
            .unwrap()
            .with_base_url("http://x.test/v1/");
        assert_eq!(provider.base_url, "http://x.test/v1");
        assert_eq!(provider.model(), DEFAULT_MODEL);
    }
}
