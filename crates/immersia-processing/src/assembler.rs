//! Chunk assembler: concatenates staged chunks into the final output file.

use immersia_storage::{ChunkStore, ChunkStoreError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Incomplete chunks: {received} of {total_chunks} staged, first missing index {first_missing}")]
    IncompleteChunks {
        received: usize,
        total_chunks: u32,
        first_missing: u32,
    },

    #[error("Chunk store error: {0}")]
    ChunkStore(#[from] ChunkStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Concatenate the staged chunks of a session, in strictly ascending index
/// order, into `output_path`.
///
/// Completeness is checked against the staged index set before any byte is
/// written. The output is built in a sibling `.part` file and renamed into
/// place only after a full pass, so a failure never leaves a partial output
/// behind. Staged chunks are left in place; the completion pipeline deletes
/// them once the assembled file has also passed digest verification, so a
/// failed completion can be retried without re-uploading.
///
/// Returns the total number of bytes written.
#[tracing::instrument(skip(store, output_path), fields(output = %output_path.display()))]
pub async fn assemble(
    store: &dyn ChunkStore,
    session_id: Uuid,
    total_chunks: u32,
    output_path: &Path,
) -> Result<u64, AssembleError> {
    let staged = store.list_indices(session_id).await?;

    if let Some(first_missing) = (0..total_chunks).find(|i| !staged.contains(i)) {
        return Err(AssembleError::IncompleteChunks {
            received: staged.range(0..total_chunks).count(),
            total_chunks,
            first_missing,
        });
    }

    let start = std::time::Instant::now();
    let tmp_path = part_path(output_path);

    let result = write_chunks(store, session_id, total_chunks, &tmp_path).await;

    let total_bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            // No partial output may survive a failed assembly
            if let Err(cleanup) = fs::remove_file(&tmp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %tmp_path.display(),
                        error = %cleanup,
                        "Failed to remove partial assembly output"
                    );
                }
            }
            return Err(e);
        }
    };

    fs::rename(&tmp_path, output_path).await?;

    tracing::info!(
        session_id = %session_id,
        chunks = total_chunks,
        total_bytes,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Chunks assembled"
    );

    Ok(total_bytes)
}

async fn write_chunks(
    store: &dyn ChunkStore,
    session_id: Uuid,
    total_chunks: u32,
    tmp_path: &Path,
) -> Result<u64, AssembleError> {
    let mut output = fs::File::create(tmp_path).await?;
    let mut total_bytes = 0u64;

    for index in 0..total_chunks {
        let data = store.read_chunk(session_id, index).await?;
        total_bytes += data.len() as u64;
        output.write_all(&data).await?;
    }

    output.flush().await?;
    output.sync_all().await?;

    Ok(total_bytes)
}

fn part_path(output_path: &Path) -> PathBuf {
    let mut name = output_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    output_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use immersia_storage::LocalChunkStore;
    use tempfile::tempdir;

    async fn store_with_chunks(
        base: &Path,
        session_id: Uuid,
        chunks: &[(u32, &[u8])],
    ) -> LocalChunkStore {
        let store = LocalChunkStore::new(base).await.unwrap();
        for (index, data) in chunks {
            store
                .put_chunk(session_id, *index, Bytes::copy_from_slice(data))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_assemble_concatenates_in_index_order() {
        let dir = tempdir().unwrap();
        let session_id = Uuid::new_v4();
        // Staged out of order; output must follow index order
        let store = store_with_chunks(
            dir.path(),
            session_id,
            &[(2, b"charlie"), (0, b"alpha"), (1, b"bravo")],
        )
        .await;

        let output = dir.path().join("out.bin");
        let bytes = assemble(&store, session_id, 3, &output).await.unwrap();

        assert_eq!(bytes, 17);
        let assembled = fs::read(&output).await.unwrap();
        assert_eq!(assembled, b"alphabravocharlie");
    }

    #[tokio::test]
    async fn test_assemble_rejects_gaps_before_writing() {
        let dir = tempdir().unwrap();
        let session_id = Uuid::new_v4();
        let store =
            store_with_chunks(dir.path(), session_id, &[(0, b"alpha"), (2, b"charlie")]).await;

        let output = dir.path().join("out.bin");
        let err = assemble(&store, session_id, 3, &output).await.unwrap_err();

        match err {
            AssembleError::IncompleteChunks {
                received,
                total_chunks,
                first_missing,
            } => {
                assert_eq!(received, 2);
                assert_eq!(total_chunks, 3);
                assert_eq!(first_missing, 1);
            }
            other => panic!("expected IncompleteChunks, got {:?}", other),
        }

        // Neither the output nor a partial file may exist
        assert!(!output.exists());
        assert!(!part_path(&output).exists());
    }

    #[tokio::test]
    async fn test_assemble_keeps_staged_chunks() {
        let dir = tempdir().unwrap();
        let session_id = Uuid::new_v4();
        let store = store_with_chunks(dir.path(), session_id, &[(0, b"only")]).await;

        let output = dir.path().join("out.bin");
        assemble(&store, session_id, 1, &output).await.unwrap();

        // Cleanup is the completion pipeline's job, after digest verification
        assert_eq!(store.list_indices(session_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_assemble_uses_last_written_chunk_bytes() {
        let dir = tempdir().unwrap();
        let session_id = Uuid::new_v4();
        let store = store_with_chunks(dir.path(), session_id, &[(0, b"first"), (1, b"tail")]).await;

        store
            .put_chunk(session_id, 0, Bytes::from_static(b"SECOND"))
            .await
            .unwrap();

        let output = dir.path().join("out.bin");
        assemble(&store, session_id, 2, &output).await.unwrap();

        let assembled = fs::read(&output).await.unwrap();
        assert_eq!(assembled, b"SECONDtail");
    }
}
