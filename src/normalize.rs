//! Image normalization for catalog previews.
//!
//! Every ingested image is letterboxed onto a fixed 200x200 white canvas and
//! re-encoded as JPEG, so the catalog UI gets a uniform preview regardless of
//! the source aspect ratio. Letterboxing (rather than cropping) keeps the full
//! silhouette visible, which matters for furniture imagery.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Side length of the square preview canvas.
pub const TARGET_SIZE: u32 = 200;

/// JPEG re-encode quality (percent).
pub const JPEG_QUALITY: u8 = 82;

/// A transient on-disk copy of the encoded preview.
///
/// Single-owner: the pipeline releases it explicitly on success, on error, and
/// when a later normalization supersedes it. `Drop` removes the file as a
/// backstop so a panic cannot accumulate previews.
#[derive(Debug)]
pub struct PreviewHandle {
    path: PathBuf,
    released: bool,
}

impl PreviewHandle {
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Remove the preview file. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.released {
            if let Err(err) = std::fs::remove_file(&self.path) {
                tracing::debug!(path = %self.path.display(), "preview cleanup failed: {err}");
            }
            self.released = true;
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// A source image re-encoded onto the fixed preview canvas.
#[derive(Debug)]
pub struct NormalizedImage {
    /// JPEG-encoded canvas bytes.
    pub jpeg: Vec<u8>,
    /// The same bytes, base64-encoded for JSON transport.
    pub base64: String,
    /// Suggested filename, `{stem}.jpg`.
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    preview: Option<PreviewHandle>,
}

impl NormalizedImage {
    /// Release the transient preview file, if still held.
    pub fn release_preview(&mut self) {
        if let Some(handle) = self.preview.as_mut() {
            handle.release();
        }
        self.preview = None;
    }

    pub fn preview_path(&self) -> Option<&std::path::Path> {
        self.preview.as_ref().map(|h| h.path())
    }
}

/// Compute the centered draw rectangle for a source image letterboxed into the
/// target canvas: `(draw_w, draw_h, offset_x, offset_y)`.
///
/// The source is scaled by the largest ratio that fits both dimensions, so the
/// aspect ratio is preserved and nothing is cropped.
pub fn letterbox_geometry(src_w: u32, src_h: u32) -> (u32, u32, u32, u32) {
    let ratio = f64::min(
        TARGET_SIZE as f64 / src_w as f64,
        TARGET_SIZE as f64 / src_h as f64,
    );
    let draw_w = ((src_w as f64 * ratio).round() as u32).clamp(1, TARGET_SIZE);
    let draw_h = ((src_h as f64 * ratio).round() as u32).clamp(1, TARGET_SIZE);
    let offset_x = (TARGET_SIZE - draw_w) / 2;
    let offset_y = (TARGET_SIZE - draw_h) / 2;
    (draw_w, draw_h, offset_x, offset_y)
}

/// Normalize an arbitrary raster image into the fixed 200x200 JPEG preview.
///
/// Decodes `bytes`, letterboxes onto a white canvas, re-encodes as JPEG at
/// quality 82, and writes a transient preview file the caller must release.
pub fn normalize_to_jpeg(bytes: &[u8], stem: &str) -> Result<NormalizedImage> {
    let source = image::load_from_memory(bytes)
        .map_err(|e| Error::LocalEncoding(format!("unable to decode source image: {e}")))?;

    let (src_w, src_h) = (source.width(), source.height());
    if src_w == 0 || src_h == 0 {
        return Err(Error::LocalEncoding("source image has zero dimension".into()));
    }

    let (draw_w, draw_h, offset_x, offset_y) = letterbox_geometry(src_w, src_h);
    let scaled = source.resize_exact(draw_w, draw_h, FilterType::Triangle).to_rgb8();

    let mut canvas = RgbImage::from_pixel(TARGET_SIZE, TARGET_SIZE, Rgb([255, 255, 255]));
    image::imageops::overlay(&mut canvas, &scaled, offset_x as i64, offset_y as i64);

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    DynamicImage::ImageRgb8(canvas)
        .write_with_encoder(encoder)
        .map_err(|e| Error::LocalEncoding(format!("JPEG encode failed: {e}")))?;
    if jpeg.is_empty() {
        return Err(Error::LocalEncoding("JPEG encode produced no output".into()));
    }

    let base64 = BASE64.encode(&jpeg);
    let stem = if stem.is_empty() { "image" } else { stem };
    let file_name = format!("{stem}.jpg");

    let preview = write_preview(&jpeg)?;

    Ok(NormalizedImage {
        jpeg,
        base64,
        file_name,
        width: TARGET_SIZE,
        height: TARGET_SIZE,
        preview: Some(preview),
    })
}

fn write_preview(jpeg: &[u8]) -> Result<PreviewHandle> {
    let dir = std::env::temp_dir().join("furnivec-previews");
    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::LocalEncoding(format!("cannot create preview dir: {e}")))?;
    let path = dir.join(format!("{}.jpg", uuid::Uuid::new_v4()));
    std::fs::write(&path, jpeg)
        .map_err(|e| Error::LocalEncoding(format!("cannot write preview file: {e}")))?;
    Ok(PreviewHandle {
        path,
        released: false,
    })
}

/// Filename without its final extension, defaulting to `"image"`.
pub fn file_stem(name: &str) -> String {
    let stem = match name.rfind('.') {
        // Only strip when something follows the dot, so "chair." stays intact.
        Some(idx) if idx + 1 < name.len() => &name[..idx],
        _ => name,
    };
    if stem.is_empty() {
        "image".to_string()
    } else {
        stem.to_string()
    }
}
