//! Batch ingestion pipeline.
//!
//! Drives each selected image through Description → Embedding → Normalization
//! → Ingestion, strictly one item at a time. Per-item failures are terminal
//! for that item only; the batch always runs to completion and reports an
//! aggregate summary. Observers receive a read-only snapshot of the item
//! sequence after every transition.
//!
//! Status advances `pending → processing → {success | error}` and never
//! regresses; transitions are applied through the pure [`apply_transition`]
//! function rather than in-place mutation, so the driver loop is the single
//! mutator of the sequence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::describe::Description;
use crate::error::{Error, Result};
use crate::normalize::{self, NormalizedImage};

pub type Embedding = Vec<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Success,
    Error,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// One queued image. Owned by the batch run; observers only ever see clones.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub id: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub relative_path: String,
    pub status: BatchStatus,
    pub message: Option<String>,
}

/// A single state-machine step for one item.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Enter (or stay in) `processing` with a stage message.
    Progress(String),
    /// Terminal success; clears any message.
    Succeeded,
    /// Terminal failure with a retained human-readable message.
    Failed(String),
}

/// Payload for the ingestion stage, matching the `/api/ingest` wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    pub description: Description,
    pub embedding: Embedding,
}

/// The three remote pipeline stages. Implemented by [`crate::api_client::ApiClient`]
/// for real runs and by mocks in tests; normalization is local and handled by
/// the driver itself.
#[async_trait]
pub trait IngestStages: Send + Sync {
    async fn describe(&self, image: &[u8], mime: &str) -> Result<Description>;
    async fn embed(&self, description: &Description) -> Result<Embedding>;
    /// Persist one item; returns the stored row.
    async fn ingest(&self, request: IngestRequest) -> Result<Value>;
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Normalize each image and ship the 200x200 base64 preview. The offline
    /// script variant runs without previews (`imageUrl: null`).
    pub previews: bool,
    /// Fixed delay between items for unattended runs.
    pub pacing: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Build the pending queue from `(path, relative_path)` pairs, ordered by the
/// lexicographic sort of the relative paths.
pub fn queue_items(files: Vec<(PathBuf, String)>) -> Vec<BatchItem> {
    let mut files = files;
    files.sort_by(|a, b| a.1.cmp(&b.1));
    files
        .into_iter()
        .map(|(path, relative_path)| BatchItem {
            id: uuid::Uuid::new_v4().to_string(),
            path,
            relative_path,
            status: BatchStatus::Pending,
            message: None,
        })
        .collect()
}

/// Apply one transition to the item with the given id, returning a new
/// sequence. Items in a terminal state are left untouched, so a status can
/// never regress; `Succeeded` clears the message.
pub fn apply_transition(items: &[BatchItem], id: &str, transition: &Transition) -> Vec<BatchItem> {
    items
        .iter()
        .map(|item| {
            if item.id != id || item.status.is_terminal() {
                return item.clone();
            }
            let mut next = item.clone();
            match transition {
                Transition::Progress(message) => {
                    next.status = BatchStatus::Processing;
                    next.message = Some(message.clone());
                }
                Transition::Succeeded => {
                    next.status = BatchStatus::Success;
                    next.message = None;
                }
                Transition::Failed(message) => {
                    next.status = BatchStatus::Error;
                    next.message = Some(message.clone());
                }
            }
            next
        })
        .collect()
}

/// MIME type for an image path, by extension. Defaults to JPEG.
pub fn detect_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Run the full pipeline over every queued item, sequentially.
///
/// One item's failure never aborts the batch. Returns the final item sequence
/// and the aggregate summary.
pub async fn run_batch<S: IngestStages + ?Sized>(
    stages: &S,
    items: Vec<BatchItem>,
    options: &RunOptions,
    mut observer: impl FnMut(&[BatchItem]),
) -> (Vec<BatchItem>, BatchSummary) {
    let total = items.len();
    let mut items = items;

    for index in 0..total {
        let id = items[index].id.clone();
        let path = items[index].path.clone();
        let relative_path = items[index].relative_path.clone();
        info!(item = %relative_path, "processing {} of {total}", index + 1);

        let outcome = {
            let mut note = |message: &str| {
                items = apply_transition(&items, &id, &Transition::Progress(message.into()));
                observer(&items);
            };
            ingest_one(stages, &path, None, options, &mut note).await
        };

        let transition = match outcome {
            Ok(_) => Transition::Succeeded,
            Err(err) => {
                warn!(item = %relative_path, "item failed: {err}");
                Transition::Failed(err.to_string())
            }
        };
        items = apply_transition(&items, &id, &transition);
        observer(&items);

        if let Some(delay) = options.pacing {
            if index + 1 < total {
                tokio::time::sleep(delay).await;
            }
        }
    }

    let succeeded = items
        .iter()
        .filter(|i| i.status == BatchStatus::Success)
        .count();
    let summary = BatchSummary {
        total,
        succeeded,
        failed: total - succeeded,
    };
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "batch complete"
    );
    (items, summary)
}

/// Run the pipeline for a single image, aborting on the first stage failure.
pub async fn run_single<S: IngestStages + ?Sized>(
    stages: &S,
    path: &Path,
    name: Option<&str>,
    options: &RunOptions,
) -> Result<Value> {
    let mut note = |message: &str| info!("{message}");
    ingest_one(stages, path, name, options, &mut note).await
}

/// Drive one image through the stages. Releases the normalized preview on
/// both the success and the failure path before returning.
async fn ingest_one<S: IngestStages + ?Sized>(
    stages: &S,
    path: &Path,
    name: Option<&str>,
    options: &RunOptions,
    note: &mut dyn FnMut(&str),
) -> Result<Value> {
    note("Describing image with the vision model...");
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::InputValidation(format!("unable to read {}: {e}", path.display())))?;
    let description = stages.describe(&bytes, detect_mime(path)).await?;

    note("Embedding the description...");
    let embedding = stages.embed(&description).await?;

    let stem = normalize::file_stem(
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image"),
    );

    let mut normalized: Option<NormalizedImage> = None;
    if options.previews {
        note("Preparing 200x200 JPEG preview...");
        normalized = Some(normalize::normalize_to_jpeg(&bytes, &stem)?);
    }

    note("Saving to the catalog...");
    let request = IngestRequest {
        name: Some(name.unwrap_or(&stem).to_string()),
        image_url: None,
        image_base64: normalized.as_ref().map(|n| n.base64.clone()),
        image_name: normalized.as_ref().map(|n| n.file_name.clone()),
        description,
        embedding,
    };
    let outcome = stages.ingest(request).await;

    if let Some(mut preview) = normalized {
        preview.release_preview();
    }

    outcome
}
