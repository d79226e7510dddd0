//! # ab-storage-local
//!
//! Local filesystem implementation of `MediaStore` for ad images.
//! Features: Content-addressable storage, directory sharding, and thumbnailing.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use ab_core::traits::MediaStore;
use anyhow::{bail, Context};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, ImageReader};
use sha2::{Digest, Sha256};
use tokio::fs;

const THUMBNAIL_EDGE: u32 = 250;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./media/ads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/media/ads")
    url_prefix: String,
}

/// Shard prefix for a media id: "ab/cd".
fn shard(media_id: &str) -> (&str, &str) {
    (
        media_id.get(0..2).unwrap_or("00"),
        media_id.get(2..4).unwrap_or("00"),
    )
}

fn thumbnail_name(media_id: &str) -> String {
    let stem = media_id.split('.').next().unwrap_or(media_id);
    format!("thumb_{stem}.webp")
}

/// Decodes the upload and renders a WebP thumbnail. Fails on anything that is
/// not a readable image of the declared format.
fn render_thumbnail(data: &[u8], format: ImageFormat) -> anyhow::Result<Vec<u8>> {
    let img = ImageReader::with_format(Cursor::new(data), format)
        .decode()
        .context("upload is not a readable image")?;
    let thumb = DynamicImage::ImageRgba8(img.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE).to_rgba8());

    let mut encoded = Vec::new();
    thumb.write_to(&mut Cursor::new(&mut encoded), ImageFormat::WebP)?;
    Ok(encoded)
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root_path: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Generates a sharded directory: "<root>/ab/cd"
    fn shard_dir(&self, media_id: &str) -> PathBuf {
        let (a, b) = shard(media_id);
        self.root_path.join(a).join(b)
    }

    pub fn path_of(&self, media_id: &str) -> PathBuf {
        self.shard_dir(media_id).join(media_id)
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    /// Saves an upload using its SHA-256 hash as the filename.
    /// Identical uploads map to the same media id.
    async fn save_upload(&self, data: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        let Some(format) = ImageFormat::from_mime_type(content_type) else {
            bail!("unsupported media type {content_type}");
        };
        let extension = format.extensions_str().first().copied().unwrap_or("bin");

        let hash = hex::encode(Sha256::digest(&data));
        let media_id = format!("{hash}.{extension}");
        let dir = self.shard_dir(&media_id);
        let target_path = dir.join(&media_id);

        if fs::try_exists(&target_path).await.unwrap_or(false) {
            tracing::debug!(%media_id, "upload already stored");
            return Ok(media_id);
        }

        let (data, thumbnail) = tokio::task::spawn_blocking(move || {
            render_thumbnail(&data, format).map(|thumb| (data, thumb))
        })
        .await??;

        fs::create_dir_all(&dir).await?;
        fs::write(&target_path, &data).await?;
        fs::write(dir.join(thumbnail_name(&media_id)), &thumbnail).await?;

        tracing::info!(%media_id, bytes = data.len(), "stored ad image");
        Ok(media_id)
    }

    fn url(&self, media_id: &str) -> String {
        let (a, b) = shard(media_id);
        format!("{}/{a}/{b}/{media_id}", self.url_prefix)
    }

    fn thumbnail_url(&self, media_id: &str) -> String {
        let (a, b) = shard(media_id);
        format!("{}/{a}/{b}/{}", self.url_prefix, thumbnail_name(media_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn stores_original_and_thumbnail_under_sharded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/media/ads/");

        let media_id = store.save_upload(png_bytes(600, 400), "image/png").await.unwrap();
        assert!(media_id.ends_with(".png"));
        assert!(store.path_of(&media_id).exists());

        let thumb_path = store.shard_dir(&media_id).join(thumbnail_name(&media_id));
        let thumb = image::open(&thumb_path).unwrap();
        assert_eq!(thumb.width(), THUMBNAIL_EDGE);

        let (a, b) = shard(&media_id);
        assert_eq!(store.url(&media_id), format!("/media/ads/{a}/{b}/{media_id}"));
        assert!(store.thumbnail_url(&media_id).ends_with(".webp"));
    }

    #[tokio::test]
    async fn identical_uploads_share_an_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/media");
        let first = store.save_upload(png_bytes(10, 10), "image/png").await.unwrap();
        let second = store.save_upload(png_bytes(10, 10), "image/png").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn non_images_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/media");
        assert!(store.save_upload(b"hello".to_vec(), "text/plain").await.is_err());
        assert!(store.save_upload(b"hello".to_vec(), "image/png").await.is_err());
    }
}
