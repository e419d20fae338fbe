//! Embedding client.
//!
//! Converts a [`Description`] into a fixed-length vector via the OpenRouter
//! embeddings endpoint. The description is serialized to a JSON string and
//! embedded as a single input; the dimensionality is whatever the configured
//! model produces.

use serde::Deserialize;
use serde_json::json;

use crate::config::OpenRouterConfig;
use crate::describe::Description;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct EmbedClient {
    http: reqwest::Client,
    config: OpenRouterConfig,
}

impl EmbedClient {
    pub fn new(http: reqwest::Client, config: OpenRouterConfig) -> Self {
        Self { http, config }
    }

    /// Embed a description. Returns a non-empty vector or an error.
    pub async fn embed(&self, description: &Description) -> Result<Vec<f32>> {
        if self.config.api_key.is_empty() {
            return Err(Error::ConfigurationMissing {
                name: "OPENROUTER_API_KEY",
            });
        }

        let input = serde_json::to_string(description)
            .map_err(|e| Error::InputValidation(format!("description not serializable: {e}")))?;

        let response = self
            .http
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&json!({
                "model": self.config.embed_model,
                "input": input,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::from_upstream("openrouter embed", response).await);
        }

        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::malformed("openrouter embed", e.to_string()))?;

        let embedding = payload
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| Error::malformed("openrouter embed", "embedding missing in response"))?;

        if embedding.is_empty() {
            return Err(Error::malformed("openrouter embed", "embedding was empty"));
        }

        Ok(embedding)
    }
}
