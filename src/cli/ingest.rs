use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api_client::ApiClient;
use crate::config::FurnivecConfig;
use crate::pipeline::{self, BatchStatus, RunOptions};

/// Extensions accepted by the directory scan.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_lowercase();
            IMAGE_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Ingest a single image file or every image in a directory.
///
/// Directory runs pace themselves with a fixed inter-item delay and continue
/// past individual failures; the process only fails on a top-level error.
pub async fn ingest(
    config: &FurnivecConfig,
    path: &Path,
    name: Option<&str>,
    previews: bool,
    pace_ms: Option<u64>,
) -> Result<()> {
    let client = ApiClient::new(reqwest::Client::new(), &config.client);

    if path.is_dir() {
        ingest_directory(config, &client, path, previews, pace_ms).await
    } else {
        // Single runs abort on the first failing stage and always ship a
        // normalized preview, matching the one-image form flow.
        let options = RunOptions {
            previews: true,
            pacing: None,
        };
        let item = pipeline::run_single(&client, path, name, &options).await?;
        let label = item
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        println!("Ingested {label}");
        Ok(())
    }
}

async fn ingest_directory(
    config: &FurnivecConfig,
    client: &ApiClient,
    dir: &Path,
    previews: bool,
    pace_ms: Option<u64>,
) -> Result<()> {
    let mut files: Vec<(PathBuf, String)> = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.context("failed to read directory entry")?;
        let path = entry.path();
        if path.is_file() && is_image_file(&path) {
            let relative = entry.file_name().to_string_lossy().into_owned();
            files.push((path, relative));
        }
    }

    if files.is_empty() {
        println!("No images found in {}", dir.display());
        return Ok(());
    }

    let items = pipeline::queue_items(files);
    println!("{} image(s) queued for ingestion.", items.len());

    let options = RunOptions {
        previews,
        pacing: Some(Duration::from_millis(
            pace_ms.unwrap_or(config.ingest.pace_ms),
        )),
    };

    let pb = ProgressBar::new(items.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("valid template")
            .progress_chars("##-"),
    );

    let observer = |snapshot: &[pipeline::BatchItem]| {
        let done = snapshot.iter().filter(|i| i.status.is_terminal()).count();
        pb.set_position(done as u64);
        if let Some(active) = snapshot
            .iter()
            .find(|i| i.status == BatchStatus::Processing)
        {
            let stage = active.message.as_deref().unwrap_or("");
            pb.set_message(format!("{}: {stage}", active.relative_path));
        }
    };

    let (items, summary) = pipeline::run_batch(client, items, &options, observer).await;
    pb.finish_and_clear();

    for item in &items {
        match item.status {
            BatchStatus::Success => println!("  ok      {}", item.relative_path),
            BatchStatus::Error => println!(
                "  failed  {} — {}",
                item.relative_path,
                item.message.as_deref().unwrap_or("unknown error")
            ),
            _ => {}
        }
    }
    println!(
        "Batch complete: {} succeeded, {} failed.",
        summary.succeeded, summary.failed
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extension_filter_is_case_insensitive() {
        assert!(is_image_file(Path::new("a.png")));
        assert!(is_image_file(Path::new("a.JPG")));
        assert!(is_image_file(Path::new("a.Jpeg")));
        assert!(is_image_file(Path::new("a.webp")));
        assert!(is_image_file(Path::new("a.gif")));
        assert!(!is_image_file(Path::new("a.txt")));
        assert!(!is_image_file(Path::new("a.jpg.bak")));
        assert!(!is_image_file(Path::new("noext")));
    }
}
