//! HTTP client for a running `furnivec serve` instance.
//!
//! The CLI drives the pipeline through the same API routes the browser would
//! use, so server-side configuration (keys, bucket, models) stays in one
//! place. Implements [`IngestStages`] for the batch controller.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::describe::Description;
use crate::error::{Error, Result};
use crate::pipeline::{Embedding, IngestRequest, IngestStages};
use crate::supabase::Match;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Rank stored items against a query embedding.
    pub async fn search(
        &self,
        embedding: &[f32],
        limit: u32,
        threshold: f64,
    ) -> Result<Vec<Match>> {
        #[derive(Deserialize)]
        struct SearchResponse {
            matches: Vec<Match>,
        }

        let response = self
            .http
            .post(format!("{}/api/search", self.base))
            .json(&json!({
                "embedding": embedding,
                "limit": limit,
                "threshold": threshold,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_failure("search", response).await);
        }

        let payload: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::malformed("search", e.to_string()))?;
        Ok(payload.matches)
    }
}

#[async_trait]
impl IngestStages for ApiClient {
    async fn describe(&self, image: &[u8], mime: &str) -> Result<Description> {
        #[derive(Deserialize)]
        struct DescribeResponse {
            description: Description,
        }

        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("image")
            .mime_str(mime)
            .map_err(|e| Error::InputValidation(format!("invalid mime type {mime}: {e}")))?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .http
            .post(format!("{}/api/describe", self.base))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_failure("describe", response).await);
        }

        let payload: DescribeResponse = response
            .json()
            .await
            .map_err(|e| Error::malformed("describe", e.to_string()))?;
        Ok(payload.description)
    }

    async fn embed(&self, description: &Description) -> Result<Embedding> {
        #[derive(Deserialize)]
        struct EmbedResponse {
            embedding: Embedding,
        }

        let response = self
            .http
            .post(format!("{}/api/embed", self.base))
            .json(&json!({ "description": description }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_failure("embed", response).await);
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::malformed("embed", e.to_string()))?;
        Ok(payload.embedding)
    }

    async fn ingest(&self, request: IngestRequest) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}/api/ingest", self.base))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_failure("ingest", response).await);
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::malformed("ingest", e.to_string()))?;
        Ok(payload.get("item").cloned().unwrap_or(Value::Null))
    }
}

/// Build an error from a failed API response, preferring the route's own
/// `detail`/`error` fields over a generic message.
async fn api_failure(stage: &'static str, response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let detail = match response.json::<Value>().await {
        Ok(body) => body
            .get("detail")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{stage} request failed ({status})")),
        Err(_) => format!("{stage} request failed ({status})"),
    };
    Error::UpstreamRequestFailed {
        service: stage,
        status,
        detail,
    }
}
