//! Embeddings over an Ollama-compatible HTTP endpoint.

use super::Embedder;
use crate::config::EmbeddingSettings;
use crate::error::{KildeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Embedder backed by a `POST {model, input}` endpoint.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: Url,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Both response shapes seen in the wild: Ollama's `embeddings` array and the
/// OpenAI-style `data` list. Components are optional because some servers
/// emit `null` where the model produced NaN.
#[derive(Deserialize)]
#[serde(untagged)]
enum EmbedResponse {
    Embeddings { embeddings: Vec<Vec<Option<f32>>> },
    Data { data: Vec<EmbeddingData> },
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<Option<f32>>,
    #[serde(default)]
    index: Option<usize>,
}

impl EmbedResponse {
    fn into_vectors(self) -> Vec<Vec<f32>> {
        let rows = match self {
            EmbedResponse::Embeddings { embeddings } => embeddings,
            EmbedResponse::Data { mut data } => {
                // Sort by index to ensure correct order
                if data.iter().all(|d| d.index.is_some()) {
                    data.sort_by_key(|d| d.index);
                }
                data.into_iter().map(|d| d.embedding).collect()
            }
        };

        rows.into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
            .collect()
    }
}

impl OllamaEmbedder {
    /// Create an embedder from configuration.
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        Self::with_config(
            &settings.url,
            &settings.model,
            settings.dimensions as usize,
            settings.timeout(),
        )
    }

    /// Create an embedder with an explicit endpoint, model, dimensions and timeout.
    pub fn with_config(url: &str, model: &str, dimensions: usize, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| KildeError::Config(format!("Invalid embedding URL '{}': {}", url, e)))?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url,
            model: model.to_string(),
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[instrument(skip(self, texts), fields(count = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting embeddings for {} texts", texts.len());

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| KildeError::TransientService(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KildeError::TransientService(format!(
                "Embedding endpoint returned {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| KildeError::TransientService(format!("Failed to read response: {}", e)))?;

        let parsed: EmbedResponse = serde_json::from_str(&body).map_err(|e| {
            KildeError::Validation(format!("Malformed embedding response: {}", e))
        })?;

        let vectors = parsed.into_vectors();
        debug!("Received {} embeddings", vectors.len());
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}
