//! HTTP API server.
//!
//! Exposes the four pipeline routes — `/api/describe`, `/api/embed`,
//! `/api/ingest`, `/api/search` — plus `/health`. Handlers forward to the
//! provider clients held in [`AppState`]; every failure maps through the
//! [`Error`] taxonomy to a status code (400 for input validation, 502 for
//! upstream failures, 500 for missing configuration or local encoding).

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::FurnivecConfig;
use crate::describe::{DescribeClient, Description};
use crate::embed::EmbedClient;
use crate::error::Error;
use crate::pipeline::IngestRequest;
use crate::supabase::SupabaseClient;

/// Shared route state: configuration plus one client per external service,
/// constructed once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    config: Arc<FurnivecConfig>,
    describe: DescribeClient,
    embed: EmbedClient,
    supabase: SupabaseClient,
}

impl AppState {
    pub fn new(config: FurnivecConfig) -> Self {
        let http = reqwest::Client::new();
        Self {
            describe: DescribeClient::new(http.clone(), config.openrouter.clone()),
            embed: EmbedClient::new(http.clone(), config.openrouter.clone()),
            supabase: SupabaseClient::new(http, config.supabase.clone()),
            config: Arc::new(config),
        }
    }
}

/// Build the router with all API routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/describe", post(describe_handler))
        .route("/api/embed", post(embed_handler))
        .route("/api/ingest", post(ingest_handler))
        .route("/api/search", post(search_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the API server, validating configuration before binding.
pub async fn serve(config: FurnivecConfig) -> anyhow::Result<()> {
    config.validate_for_serve()?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let router = build_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "API server listening at http://{bind_addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down API server");
        })
        .await?;

    Ok(())
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Error::InputValidation(_) => StatusCode::BAD_REQUEST,
            Error::UpstreamRequestFailed { .. } | Error::MalformedUpstreamResponse { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Error::ConfigurationMissing { .. } | Error::LocalEncoding(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            Error::UpstreamRequestFailed {
                service, detail, ..
            } => json!({ "error": format!("{service} request failed"), "detail": detail }),
            other => json!({ "error": other.to_string() }),
        };

        tracing::warn!(status = %status, "request failed: {self}");
        (status, Json(body)).into_response()
    }
}

/// POST /api/describe — multipart with an `image` field.
async fn describe_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, Error> {
    if state.config.openrouter.api_key.is_empty() {
        return Err(Error::ConfigurationMissing {
            name: "OPENROUTER_API_KEY",
        });
    }

    let mut image: Option<(Vec<u8>, String)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InputValidation(format!("invalid multipart payload: {e}")))?
    {
        if field.name() == Some("image") {
            let mime = field
                .content_type()
                .unwrap_or("image/jpeg")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Error::InputValidation(format!("unable to read image field: {e}")))?;
            image = Some((bytes.to_vec(), mime));
            break;
        }
    }

    let (bytes, mime) = image.ok_or_else(|| Error::InputValidation("image file required".into()))?;
    let description = state.describe.describe(&bytes, &mime).await?;
    Ok(Json(json!({ "description": description })))
}

/// POST /api/embed — `{ "description": { ... } }`.
async fn embed_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Error> {
    if state.config.openrouter.api_key.is_empty() {
        return Err(Error::ConfigurationMissing {
            name: "OPENROUTER_API_KEY",
        });
    }

    let description = match body.get("description") {
        Some(value) if !value.is_null() => value.clone(),
        _ => return Err(Error::InputValidation("description payload required".into())),
    };
    let description: Description = serde_json::from_value(description)
        .map_err(|e| Error::InputValidation(format!("description does not match schema: {e}")))?;

    let embedding = state.embed.embed(&description).await?;
    Ok(Json(json!({ "embedding": embedding })))
}

/// POST /api/ingest — persists one item, uploading the preview first when a
/// base64 payload is attached.
async fn ingest_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Error> {
    if state.config.supabase.service_role_key.is_empty() {
        return Err(Error::ConfigurationMissing {
            name: "SUPABASE_SERVICE_ROLE_KEY",
        });
    }

    let has_description = body.get("description").is_some_and(|v| !v.is_null());
    let has_embedding = body.get("embedding").is_some_and(|v| !v.is_null());
    if !has_description || !has_embedding {
        return Err(Error::InputValidation(
            "description and embedding are required".into(),
        ));
    }

    let request: IngestRequest = serde_json::from_value(body)
        .map_err(|e| Error::InputValidation(format!("ingest payload invalid: {e}")))?;
    if request.embedding.is_empty() {
        return Err(Error::InputValidation("embedding must not be empty".into()));
    }

    let mut public_url = request.image_url.clone();
    if let Some(encoded) = request.image_base64.as_deref() {
        let jpeg = BASE64
            .decode(strip_data_uri(encoded))
            .map_err(|e| Error::InputValidation(format!("image base64 payload invalid: {e}")))?;
        let url = state
            .supabase
            .upload_preview(&jpeg, request.image_name.as_deref())
            .await?;
        public_url = Some(url);
    }

    let item = state
        .supabase
        .insert_item(
            request.name.as_deref(),
            public_url.as_deref(),
            &request.description,
            &request.embedding,
        )
        .await?;

    Ok(Json(json!({ "item": item })))
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    embedding: Option<Vec<f32>>,
    limit: Option<u32>,
    threshold: Option<f64>,
}

/// POST /api/search — nearest-neighbor ranking for a query embedding.
async fn search_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Error> {
    if state.config.supabase.service_role_key.is_empty() {
        return Err(Error::ConfigurationMissing {
            name: "SUPABASE_SERVICE_ROLE_KEY",
        });
    }

    let request: SearchRequest = serde_json::from_value(body)
        .map_err(|e| Error::InputValidation(format!("search payload invalid: {e}")))?;
    let embedding = request
        .embedding
        .filter(|e| !e.is_empty())
        .ok_or_else(|| Error::InputValidation("embedding vector required".into()))?;

    let matches = state
        .supabase
        .match_items(
            &embedding,
            request.limit.unwrap_or(3),
            request.threshold.unwrap_or(0.0),
        )
        .await?;

    Ok(Json(json!({ "matches": matches })))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Strip an optional `data:image/...;base64,` prefix from a payload.
fn strip_data_uri(encoded: &str) -> &str {
    if encoded.starts_with("data:") {
        match encoded.find("base64,") {
            Some(idx) => &encoded[idx + "base64,".len()..],
            None => encoded,
        }
    } else {
        encoded
    }
}
