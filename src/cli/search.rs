use anyhow::{Context, Result};
use std::path::Path;

use crate::api_client::ApiClient;
use crate::config::FurnivecConfig;
use crate::pipeline::{detect_mime, IngestStages};

/// Describe a query image, embed it, and print the closest catalog matches.
pub async fn search(
    config: &FurnivecConfig,
    image: &Path,
    limit: u32,
    threshold: f64,
) -> Result<()> {
    let client = ApiClient::new(reqwest::Client::new(), &config.client);

    let bytes = std::fs::read(image)
        .with_context(|| format!("failed to read query image {}", image.display()))?;

    println!("Describing query image...");
    let description = client.describe(&bytes, detect_mime(image)).await?;

    println!("Embedding description...");
    let embedding = client.embed(&description).await?;

    let matches = client.search(&embedding, limit, threshold).await?;
    if matches.is_empty() {
        println!("No matches found.");
        return Ok(());
    }

    println!("Top matches ({}):", matches.len());
    for (rank, m) in matches.iter().enumerate() {
        let name = m.name.as_deref().unwrap_or("Unnamed item");
        println!("  {}. {name} — {:.2}%", rank + 1, m.similarity_percent);
        if let Some(url) = &m.image_url {
            println!("     {url}");
        }
        println!(
            "     {} · {} · {}",
            m.description.object_type, m.description.style, m.description.overall_aesthetic
        );
    }

    Ok(())
}
