//! # wf-storage-local
//! wayfarer/crates/wf-plugins/wf-storage-local/src/lib.rs
//! Local filesystem implementation of `ObjectStore`.
//! Objects live under a root directory at the caller's relative path and are
//! served from a URL prefix. Images also get a PNG thumbnail next to them.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};
use wf_core::error::{AppError, Result};
use wf_core::models::StoredObject;
use wf_core::traits::ObjectStore;

pub struct LocalObjectStore {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/uploads")
    url_prefix: String,
    /// Longest edge of generated thumbnails
    thumbnail_size: u32,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf, url_prefix: impl Into<String>, thumbnail_size: u32) -> Self {
        let url_prefix = url_prefix.into().trim_end_matches('/').to_string();
        Self {
            root_path: root,
            url_prefix,
            thumbnail_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.url_prefix, path)
    }

    /// Resolves a relative object path under the root.
    /// Absolute paths and parent components are rejected.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && !path.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(AppError::ValidationError(format!(
                "invalid object path: {path}"
            )));
        }
        Ok(self.root_path.join(relative))
    }

    async fn write(&self, target: &Path, data: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(target, data)
            .await
            .with_context(|| format!("writing {}", target.display()))?;
        Ok(())
    }

    /// Writes `thumb_<stem>.png` beside an image object.
    /// Returns the thumbnail's object path.
    async fn generate_thumbnail(&self, path: &str, data: Vec<u8>) -> anyhow::Result<String> {
        let thumb_path = thumbnail_path(path);
        let target = self.root_path.join(&thumb_path);
        let size = self.thumbnail_size;

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let img = image::load_from_memory(&data).context("decoding image")?;
            img.thumbnail(size, size)
                .save_with_format(&target, image::ImageFormat::Png)
                .context("encoding thumbnail")?;
            Ok(())
        })
        .await
        .context("thumbnail task panicked")??;

        Ok(thumb_path)
    }
}

fn thumbnail_path(path: &str) -> String {
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    match dir {
        Some(dir) => format!("{dir}/thumb_{stem}.png"),
        None => format!("thumb_{stem}.png"),
    }
}

fn looks_like_image(path: &str) -> bool {
    image::ImageFormat::from_path(path).is_ok()
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    /// Saves an upload at `path` under the root, replacing any previous object.
    async fn upload_object(&self, path: &str, data: Vec<u8>) -> Result<StoredObject> {
        let target = self.resolve(path)?;
        self.write(&target, &data).await?;
        debug!(%path, size = data.len(), "object written");

        let thumbnail_url = if looks_like_image(path) {
            match self.generate_thumbnail(path, data).await {
                Ok(thumb) => Some(self.public_url(&thumb)),
                Err(err) => {
                    // the original is still usable without a preview
                    warn!(%path, error = %format!("{err:#}"), "thumbnail generation failed");
                    None
                }
            }
        } else {
            None
        };

        Ok(StoredObject {
            public_url: self.public_url(path),
            thumbnail_url,
        })
    }
}
