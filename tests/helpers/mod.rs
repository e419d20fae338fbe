#![allow(dead_code)]

use async_trait::async_trait;
use furnivec::describe::{Colors, Description, Materials, ShapeAndForm};
use furnivec::error::{Error, Result};
use furnivec::pipeline::{Embedding, IngestRequest, IngestStages};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Which pipeline stage a scripted item should fail at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Describe,
    Embed,
    Ingest,
}

/// Scriptable stage implementation for pipeline tests.
///
/// Items are identified by processing order (the pipeline is strictly
/// sequential): the first `describe` call is item 0, the second item 1, and
/// so on. Successful ingest payloads are recorded for inspection.
pub struct MockStages {
    failures: HashMap<usize, FailAt>,
    current: Mutex<usize>,
    pub ingested: Mutex<Vec<IngestRequest>>,
}

impl MockStages {
    pub fn new() -> Self {
        Self::failing_at(&[])
    }

    pub fn failing_at(failures: &[(usize, FailAt)]) -> Self {
        Self {
            failures: failures.iter().copied().collect(),
            current: Mutex::new(0),
            ingested: Mutex::new(Vec::new()),
        }
    }

    fn in_flight(&self) -> usize {
        self.current.lock().unwrap().saturating_sub(1)
    }
}

#[async_trait]
impl IngestStages for MockStages {
    async fn describe(&self, _image: &[u8], _mime: &str) -> Result<Description> {
        let index = {
            let mut current = self.current.lock().unwrap();
            let index = *current;
            *current += 1;
            index
        };
        if self.failures.get(&index) == Some(&FailAt::Describe) {
            return Err(Error::UpstreamRequestFailed {
                service: "openrouter describe",
                status: 502,
                detail: format!("scripted describe failure for item {index}"),
            });
        }
        Ok(description_for(index))
    }

    async fn embed(&self, _description: &Description) -> Result<Embedding> {
        let index = self.in_flight();
        if self.failures.get(&index) == Some(&FailAt::Embed) {
            return Err(Error::MalformedUpstreamResponse {
                service: "openrouter embed",
                detail: format!("scripted embed failure for item {index}"),
            });
        }
        Ok(vec![0.1, 0.2, 0.3, 0.4, 0.5])
    }

    async fn ingest(&self, request: IngestRequest) -> Result<Value> {
        let index = self.in_flight();
        if self.failures.get(&index) == Some(&FailAt::Ingest) {
            return Err(Error::UpstreamRequestFailed {
                service: "supabase insert",
                status: 500,
                detail: format!("scripted ingest failure for item {index}"),
            });
        }
        let name = request.name.clone();
        self.ingested.lock().unwrap().push(request);
        Ok(json!({ "id": index, "name": name }))
    }
}

/// A distinct, schema-complete description per item index.
pub fn description_for(index: usize) -> Description {
    Description {
        object_type: format!("Armchair {index}"),
        style: "Mid-Century Modern".into(),
        materials: Materials {
            frame: "Bent Plywood".into(),
            upholstery: "Beige Linen".into(),
            legs: "Walnut".into(),
            other: "N/A".into(),
        },
        colors: Colors {
            primary: "Beige".into(),
            secondary: "Walnut Brown".into(),
            finish: "Natural Oil Finish".into(),
        },
        shape_and_form: ShapeAndForm {
            silhouette: "Low-profile and rectangular".into(),
            backrest: "Curved, open-frame".into(),
            legs: "Tapered and splayed".into(),
            arms: "Sloped arms".into(),
        },
        key_features_and_details: vec!["Visible wood grain".into()],
        overall_aesthetic: "Cozy and casual".into(),
    }
}

/// Write placeholder image files under a temp dir and return
/// `(dir, [(path, relative_path)])` pairs in the given order.
pub fn fixture_files(names: &[&str]) -> (tempfile::TempDir, Vec<(PathBuf, String)>) {
    let dir = tempfile::tempdir().unwrap();
    let mut files = Vec::new();
    for name in names {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, format!("fixture:{name}")).unwrap();
        files.push((path, name.to_string()));
    }
    (dir, files)
}

/// Write a real decodable PNG fixture and return its path.
pub fn png_fixture(dir: &tempfile::TempDir, name: &str, width: u32, height: u32) -> PathBuf {
    use image::{DynamicImage, Rgb, RgbImage};
    let path = dir.path().join(name);
    let img = RgbImage::from_pixel(width, height, Rgb([120, 40, 40]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_with_encoder(image::codecs::png::PngEncoder::new(&mut bytes))
        .unwrap();
    std::fs::write(&path, bytes).unwrap();
    path
}
