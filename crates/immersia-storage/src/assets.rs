//! Asset store: kind-partitioned output directories for finished files.

use crate::traits::{ChunkStoreError, ChunkStoreResult};
use immersia_core::models::MediaKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const THUMBNAIL_SUBDIR: &str = "thumbnails";

/// Output storage for assembled assets and their thumbnails.
///
/// Files land under fixed subdirectories partitioned by media kind
/// (`videos/`, `images/`, `audio/`, `files/`) plus `thumbnails/`, and are
/// addressed by a storage key relative to the media root.
#[derive(Clone)]
pub struct AssetStore {
    base_path: PathBuf,
    base_url: String,
}

impl AssetStore {
    /// Create a new AssetStore, ensuring all output subdirectories exist.
    ///
    /// # Arguments
    /// * `base_path` - Root directory for finished assets (e.g., "data/media")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:4000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> ChunkStoreResult<Self> {
        let base_path = base_path.into();

        for subdir in [
            MediaKind::Video.subdir(),
            MediaKind::Image.subdir(),
            MediaKind::Audio.subdir(),
            MediaKind::Other.subdir(),
            THUMBNAIL_SUBDIR,
        ] {
            let dir = base_path.join(subdir);
            fs::create_dir_all(&dir).await.map_err(|e| {
                ChunkStoreError::ConfigError(format!(
                    "Failed to create media directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(AssetStore {
            base_path,
            base_url,
        })
    }

    /// Storage key for an assembled asset of the given kind.
    pub fn asset_key(&self, kind: MediaKind, file_id: Uuid, extension: &str) -> String {
        if extension.is_empty() {
            format!("{}/{}", kind.subdir(), file_id)
        } else {
            format!("{}/{}.{}", kind.subdir(), file_id, extension)
        }
    }

    /// Storage key for an asset's thumbnail.
    pub fn thumbnail_key(&self, file_id: Uuid) -> String {
        format!("{}/{}.jpg", THUMBNAIL_SUBDIR, file_id)
    }

    /// Convert a storage key to a filesystem path, rejecting traversal.
    pub fn path_for(&self, storage_key: &str) -> ChunkStoreResult<PathBuf> {
        if storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(ChunkStoreError::ConfigError(format!(
                "Storage key contains invalid characters: {}",
                storage_key
            )));
        }
        Ok(self.base_path.join(storage_key))
    }

    /// Public URL for a storage key.
    pub fn url_for(&self, storage_key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), storage_key)
    }

    pub async fn exists(&self, storage_key: &str) -> bool {
        match self.path_for(storage_key) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Delete a stored file. Deleting a missing key is not an error.
    pub async fn delete(&self, storage_key: &str) -> ChunkStoreResult<()> {
        let path = self.path_for(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            ChunkStoreError::DeleteFailed(format!(
                "Failed to delete asset {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(key = %storage_key, "Asset deleted");

        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}
