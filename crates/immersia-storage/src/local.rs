//! Local filesystem chunk store

use crate::traits::{ChunkStore, ChunkStoreError, ChunkStoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const CHUNK_PREFIX: &str = "chunk_";
const CHUNK_SUFFIX: &str = ".part";

/// Chunk store backed by a local staging directory, one subdirectory per
/// session. Session directories are keyed by UUID, so keys cannot escape the
/// staging root.
#[derive(Clone)]
pub struct LocalChunkStore {
    base_path: PathBuf,
}

impl LocalChunkStore {
    /// Create a new LocalChunkStore rooted at `base_path`.
    ///
    /// # Arguments
    /// * `base_path` - Root directory for staged chunks (e.g., "data/staging")
    pub async fn new(base_path: impl Into<PathBuf>) -> ChunkStoreResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            ChunkStoreError::ConfigError(format!(
                "Failed to create staging directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalChunkStore { base_path })
    }

    fn session_dir(&self, session_id: Uuid) -> PathBuf {
        self.base_path.join(session_id.to_string())
    }

    fn chunk_path(&self, session_id: Uuid, index: u32) -> PathBuf {
        self.session_dir(session_id)
            .join(format!("{}{:06}{}", CHUNK_PREFIX, index, CHUNK_SUFFIX))
    }

    fn parse_index(file_name: &str) -> Option<u32> {
        file_name
            .strip_prefix(CHUNK_PREFIX)?
            .strip_suffix(CHUNK_SUFFIX)?
            .parse()
            .ok()
    }
}

#[async_trait]
impl ChunkStore for LocalChunkStore {
    async fn put_chunk(&self, session_id: Uuid, index: u32, data: Bytes) -> ChunkStoreResult<()> {
        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir).await.map_err(|e| {
            ChunkStoreError::WriteFailed(format!(
                "Failed to create session directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let path = self.chunk_path(session_id, index);
        let size = data.len();

        let start = std::time::Instant::now();

        // Concurrent writes to the same slot must not interleave: build the
        // chunk in a unique temp file, then rename into place atomically so
        // the last completed write wins.
        let tmp_path = dir.join(format!(
            "{}{:06}.tmp-{}",
            CHUNK_PREFIX,
            index,
            Uuid::new_v4().simple()
        ));

        let mut file = fs::File::create(&tmp_path).await.map_err(|e| {
            ChunkStoreError::WriteFailed(format!(
                "Failed to create chunk {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        file.write_all(&data).await.map_err(|e| {
            ChunkStoreError::WriteFailed(format!(
                "Failed to write chunk {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            ChunkStoreError::WriteFailed(format!(
                "Failed to sync chunk {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        drop(file);

        fs::rename(&tmp_path, &path).await.map_err(|e| {
            ChunkStoreError::WriteFailed(format!(
                "Failed to move chunk into place {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(
            session_id = %session_id,
            chunk_index = index,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Chunk staged"
        );

        Ok(())
    }

    async fn read_chunk(&self, session_id: Uuid, index: u32) -> ChunkStoreResult<Vec<u8>> {
        let path = self.chunk_path(session_id, index);

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ChunkStoreError::NotFound { session_id, index });
        }

        fs::read(&path).await.map_err(|e| {
            ChunkStoreError::ReadFailed(format!("Failed to read chunk {}: {}", path.display(), e))
        })
    }

    async fn list_indices(&self, session_id: Uuid) -> ChunkStoreResult<BTreeSet<u32>> {
        let dir = self.session_dir(session_id);
        let mut indices = BTreeSet::new();

        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(indices);
        }

        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            ChunkStoreError::ReadFailed(format!(
                "Failed to list session directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(index) = Self::parse_index(name) {
                    indices.insert(index);
                }
            }
        }

        Ok(indices)
    }

    async fn delete_all(&self, session_id: Uuid) -> ChunkStoreResult<()> {
        let dir = self.session_dir(session_id);

        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_dir_all(&dir).await.map_err(|e| {
            ChunkStoreError::DeleteFailed(format!(
                "Failed to delete session directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        tracing::debug!(session_id = %session_id, "Staged chunks deleted");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_read_roundtrip() {
        let dir = tempdir().unwrap();
        let store = LocalChunkStore::new(dir.path()).await.unwrap();
        let session_id = Uuid::new_v4();

        store
            .put_chunk(session_id, 0, Bytes::from_static(b"first"))
            .await
            .unwrap();

        let data = store.read_chunk(session_id, 0).await.unwrap();
        assert_eq!(data, b"first");
    }

    #[tokio::test]
    async fn test_put_overwrites_slot() {
        let dir = tempdir().unwrap();
        let store = LocalChunkStore::new(dir.path()).await.unwrap();
        let session_id = Uuid::new_v4();

        store
            .put_chunk(session_id, 2, Bytes::from_static(b"old bytes"))
            .await
            .unwrap();
        store
            .put_chunk(session_id, 2, Bytes::from_static(b"new"))
            .await
            .unwrap();

        let data = store.read_chunk(session_id, 2).await.unwrap();
        assert_eq!(data, b"new");

        let indices = store.list_indices(session_id).await.unwrap();
        assert_eq!(indices.len(), 1);
    }

    #[tokio::test]
    async fn test_list_indices_tolerates_gaps_and_order() {
        let dir = tempdir().unwrap();
        let store = LocalChunkStore::new(dir.path()).await.unwrap();
        let session_id = Uuid::new_v4();

        for index in [7u32, 0, 3] {
            store
                .put_chunk(session_id, index, Bytes::from_static(b"x"))
                .await
                .unwrap();
        }

        let indices = store.list_indices(session_id).await.unwrap();
        assert_eq!(indices.into_iter().collect::<Vec<_>>(), vec![0, 3, 7]);
    }

    #[tokio::test]
    async fn test_list_indices_empty_session() {
        let dir = tempdir().unwrap();
        let store = LocalChunkStore::new(dir.path()).await.unwrap();

        let indices = store.list_indices(Uuid::new_v4()).await.unwrap();
        assert!(indices.is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_chunk() {
        let dir = tempdir().unwrap();
        let store = LocalChunkStore::new(dir.path()).await.unwrap();
        let session_id = Uuid::new_v4();

        let result = store.read_chunk(session_id, 9).await;
        assert!(matches!(result, Err(ChunkStoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_all_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = LocalChunkStore::new(dir.path()).await.unwrap();
        let session_id = Uuid::new_v4();

        store
            .put_chunk(session_id, 0, Bytes::from_static(b"x"))
            .await
            .unwrap();

        store.delete_all(session_id).await.unwrap();
        assert!(store.list_indices(session_id).await.unwrap().is_empty());

        // Second delete of the same (now missing) session succeeds
        store.delete_all(session_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let dir = tempdir().unwrap();
        let store = LocalChunkStore::new(dir.path()).await.unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.put_chunk(a, 0, Bytes::from_static(b"a")).await.unwrap();
        store.put_chunk(b, 0, Bytes::from_static(b"b")).await.unwrap();

        store.delete_all(a).await.unwrap();
        assert_eq!(store.read_chunk(b, 0).await.unwrap(), b"b");
    }
}
