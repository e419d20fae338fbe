//! Supabase ingestion and search client.
//!
//! Three concerns, all over Supabase's HTTP surface with the service-role key:
//! preview upload to a storage bucket, row insertion via PostgREST, and
//! nearest-neighbor ranking through the `match_furniture` RPC on the stored
//! pgvector column.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::SupabaseConfig;
use crate::describe::Description;
use crate::error::{Error, Result};

/// A ranked search result paired with its similarity to the query embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub description: Description,
    pub similarity: f64,
    /// Derived: `round(similarity * 10000) / 100`.
    #[serde(default)]
    pub similarity_percent: f64,
}

/// Two-decimal percentage for a raw similarity score.
pub fn similarity_percent(similarity: f64) -> f64 {
    (similarity * 10000.0).round() / 100.0
}

/// Sanitize a client-supplied filename into a storage-safe `.jpg` name.
///
/// Strips the extension, lowercases, collapses non-alphanumeric runs to single
/// hyphens, trims edge hyphens, truncates to 120 chars, and falls back to
/// `preview` when nothing survives.
pub fn sanitize_file_name(candidate: Option<&str>) -> String {
    let Some(candidate) = candidate else {
        return "preview.jpg".to_string();
    };

    let without_extension = match candidate.rfind('.') {
        Some(idx) if idx + 1 < candidate.len() => &candidate[..idx],
        _ => candidate,
    };

    let mut stem = String::new();
    let mut last_was_hyphen = false;
    for ch in without_extension.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            stem.push(ch);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            stem.push('-');
            last_was_hyphen = true;
        }
    }

    let stem: String = stem
        .trim_matches('-')
        .chars()
        .take(120)
        .collect();

    if stem.is_empty() {
        "preview.jpg".to_string()
    } else {
        format!("{stem}.jpg")
    }
}

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    pub fn new(http: reqwest::Client, config: SupabaseConfig) -> Self {
        Self { http, config }
    }

    fn require_credentials(&self) -> Result<()> {
        if self.config.url.is_empty() {
            return Err(Error::ConfigurationMissing {
                name: "SUPABASE_URL",
            });
        }
        if self.config.service_role_key.is_empty() {
            return Err(Error::ConfigurationMissing {
                name: "SUPABASE_SERVICE_ROLE_KEY",
            });
        }
        Ok(())
    }

    /// Upload a JPEG preview to the configured bucket and return its public URL.
    ///
    /// The object path is keyed by date plus a random token so repeated uploads
    /// of the same filename never collide.
    pub async fn upload_preview(&self, jpeg: &[u8], file_name: Option<&str>) -> Result<String> {
        self.require_credentials()?;

        let object_path = build_object_path(file_name);
        let response = self
            .http
            .post(format!(
                "{}/storage/v1/object/{}/{}",
                self.config.url, self.config.bucket, object_path
            ))
            .bearer_auth(&self.config.service_role_key)
            .header("apikey", &self.config.service_role_key)
            .header("Content-Type", "image/jpeg")
            .body(jpeg.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::from_upstream("supabase storage", response).await);
        }

        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url, self.config.bucket, object_path
        ))
    }

    /// Insert a `(name, image_url, description, embedding)` row and return it.
    pub async fn insert_item(
        &self,
        name: Option<&str>,
        image_url: Option<&str>,
        description: &Description,
        embedding: &[f32],
    ) -> Result<Value> {
        self.require_credentials()?;

        let response = self
            .http
            .post(format!("{}/rest/v1/{}", self.config.url, self.config.table))
            .bearer_auth(&self.config.service_role_key)
            .header("apikey", &self.config.service_role_key)
            .header("Prefer", "return=representation")
            .json(&json!({
                "name": name,
                "image_url": image_url,
                "description": description,
                "embedding": embedding,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::from_upstream("supabase insert", response).await);
        }

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| Error::malformed("supabase insert", e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| Error::malformed("supabase insert", "insert returned no row"))
    }

    /// Rank stored items against a query embedding via the `match_furniture`
    /// RPC, deriving `similarity_percent` for each match.
    pub async fn match_items(
        &self,
        embedding: &[f32],
        limit: u32,
        threshold: f64,
    ) -> Result<Vec<Match>> {
        self.require_credentials()?;

        let response = self
            .http
            .post(format!("{}/rest/v1/rpc/match_furniture", self.config.url))
            .bearer_auth(&self.config.service_role_key)
            .header("apikey", &self.config.service_role_key)
            .json(&json!({
                "query_embedding": embedding,
                "match_limit": limit,
                "match_threshold": threshold,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::from_upstream("supabase search", response).await);
        }

        let mut matches: Vec<Match> = response
            .json()
            .await
            .map_err(|e| Error::malformed("supabase search", e.to_string()))?;

        for m in &mut matches {
            m.similarity_percent = similarity_percent(m.similarity);
        }

        Ok(matches)
    }
}

fn build_object_path(file_name: Option<&str>) -> String {
    format!(
        "{}/{}-{}",
        chrono::Utc::now().format("%Y-%m-%d"),
        uuid::Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}
