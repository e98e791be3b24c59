//! Upload orchestrator: drives the chunked upload lifecycle.
//!
//! init → chunk staging → completion pipeline (assemble → digest → inspect →
//! thumbnail) → asset descriptor. Sessions are held in the injected registry;
//! chunk bytes in the chunk store; finished files in the asset store.

use bytes::Bytes;
use immersia_core::models::{
    content_type_for, AssembledAsset, MediaInfo, MediaKind, UploadSession, UploadStatus,
};
use immersia_core::{AppError, Config};
use immersia_processing::{assemble, digest_file, AssembleError, MediaInspector, ThumbnailGenerator};
use immersia_storage::{AssetStore, ChunkStore};
use std::sync::Arc;
use uuid::Uuid;

use crate::registry::{ChunkRecordOutcome, SessionRegistry};

/// Read-only progress snapshot for one session.
#[derive(Debug, Clone)]
pub struct UploadProgress {
    pub received_chunks: Vec<u32>,
    pub total_chunks: u32,
    pub status: UploadStatus,
}

pub struct UploadService {
    registry: Arc<SessionRegistry>,
    chunk_store: Arc<dyn ChunkStore>,
    asset_store: Arc<AssetStore>,
    inspector: MediaInspector,
    thumbnailer: ThumbnailGenerator,
    max_chunk_count: u32,
}

impl UploadService {
    pub fn new(
        config: &Config,
        registry: Arc<SessionRegistry>,
        chunk_store: Arc<dyn ChunkStore>,
        asset_store: Arc<AssetStore>,
    ) -> Result<Self, anyhow::Error> {
        let inspector = MediaInspector::new(config.ffprobe_path.clone())?;
        let thumbnailer = ThumbnailGenerator::new(
            config.ffmpeg_path.clone(),
            config.thumbnail_size,
            config.thumbnail_jpeg_quality,
            config.thumbnail_frame_offset_percent,
        );

        Ok(Self {
            registry,
            chunk_store,
            asset_store,
            inspector,
            thumbnailer,
            max_chunk_count: config.max_chunk_count,
        })
    }

    /// Start a new upload session.
    ///
    /// The declared chunk arithmetic must be consistent:
    /// `total_chunks == ceil(file_size / chunk_size)`.
    pub async fn init(
        &self,
        filename: String,
        file_size: u64,
        chunk_size: u64,
        total_chunks: u32,
    ) -> Result<UploadSession, AppError> {
        if filename.trim().is_empty() {
            return Err(AppError::InvalidParameters(
                "filename must not be empty".to_string(),
            ));
        }
        if file_size == 0 {
            return Err(AppError::InvalidParameters(
                "file_size must be greater than 0".to_string(),
            ));
        }
        if chunk_size == 0 {
            return Err(AppError::InvalidParameters(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        let expected_chunks = file_size.div_ceil(chunk_size);
        if expected_chunks > self.max_chunk_count as u64 {
            return Err(AppError::InvalidParameters(format!(
                "Chunk count {} exceeds maximum {}; use a larger chunk_size",
                expected_chunks, self.max_chunk_count
            )));
        }
        if total_chunks as u64 != expected_chunks {
            return Err(AppError::InvalidParameters(format!(
                "total_chunks {} disagrees with ceil({}/{}) = {}",
                total_chunks, file_size, chunk_size, expected_chunks
            )));
        }

        let mut session = UploadSession::new(filename, file_size, chunk_size, total_chunks);
        session.status = UploadStatus::Uploading;
        let snapshot = session.clone();
        self.registry.insert(session).await;

        tracing::info!(
            session_id = %snapshot.id,
            filename = %snapshot.original_filename,
            file_size,
            chunk_size,
            total_chunks,
            "Upload session started"
        );

        Ok(snapshot)
    }

    /// Stage the bytes for one chunk. Re-uploading an index overwrites the
    /// previous bytes; the index is counted once.
    pub async fn upload_chunk(
        &self,
        id: Uuid,
        chunk_index: u32,
        data: Bytes,
    ) -> Result<(), AppError> {
        self.registry.validate_chunk(id, chunk_index).await?;

        self.chunk_store
            .put_chunk(id, chunk_index, data)
            .await
            .map_err(|e| AppError::ChunkStorage(e.to_string()))?;

        match self.registry.record_chunk(id, chunk_index).await {
            ChunkRecordOutcome::Recorded { newly_received } => {
                tracing::debug!(
                    session_id = %id,
                    chunk_index,
                    newly_received,
                    "Chunk recorded"
                );
                Ok(())
            }
            ChunkRecordOutcome::SessionGone => {
                // Cancelled while the bytes were in flight; drop the stragglers
                if let Err(e) = self.chunk_store.delete_all(id).await {
                    tracing::warn!(
                        session_id = %id,
                        error = %e,
                        "Failed to drop chunks staged after cancellation"
                    );
                }
                Err(AppError::UnknownSession(id.to_string()))
            }
            ChunkRecordOutcome::NotAccepting(status) => Err(AppError::InvalidParameters(format!(
                "Session {} is {}, not accepting chunks",
                id,
                status.as_str()
            ))),
        }
    }

    /// Read-only progress; safe to call concurrently with chunk uploads.
    pub async fn progress(&self, id: Uuid) -> Result<UploadProgress, AppError> {
        let session = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| AppError::UnknownSession(id.to_string()))?;

        Ok(UploadProgress {
            received_chunks: session.received_chunks.iter().copied().collect(),
            total_chunks: session.total_chunks,
            status: session.status,
        })
    }

    /// Run the completion pipeline for a session.
    ///
    /// All chunk indices must be present. Any pipeline stage failure leaves
    /// the session `failed` with its staged chunks intact, so completion can
    /// be retried without re-uploading. On success the session state and
    /// staged chunks are discarded and the asset descriptor is returned.
    pub async fn complete(
        &self,
        id: Uuid,
        expected_hash: Option<String>,
    ) -> Result<AssembledAsset, AppError> {
        let session = self.registry.begin_completion(id).await?;

        if !session.is_complete() {
            self.registry
                .abort_completion(id, UploadStatus::Uploading)
                .await;
            return Err(AppError::IncompleteChunks {
                received: session.received_count(),
                total_chunks: session.total_chunks,
            });
        }

        match self.run_pipeline(&session, expected_hash).await {
            Ok(asset) => {
                if let Err(e) = self.chunk_store.delete_all(id).await {
                    tracing::warn!(
                        session_id = %id,
                        error = %e,
                        "Failed to delete staged chunks after completion"
                    );
                }

                if !self.registry.complete_and_remove(id).await {
                    // Cancel raced the pipeline; assembly finished first, so
                    // the asset still wins and is returned to the caller.
                    tracing::warn!(
                        session_id = %id,
                        "Session cancelled while completing; returning assembled asset"
                    );
                }

                tracing::info!(
                    session_id = %id,
                    file_id = %asset.file_id,
                    kind = asset.kind.as_str(),
                    size = asset.size,
                    "Upload completed"
                );

                Ok(asset)
            }
            Err(err) => {
                if !self.registry.abort_completion(id, UploadStatus::Failed).await {
                    // Cancel won the race and already discarded the session
                    return Err(AppError::UnknownSession(id.to_string()));
                }
                tracing::error!(
                    session_id = %id,
                    error = %err,
                    "Completion pipeline failed; chunks retained for retry"
                );
                Err(err)
            }
        }
    }

    /// Cancel a session: discard its state and staged chunks. Idempotent —
    /// an unknown or already-cancelled identifier is not an error.
    pub async fn cancel(&self, id: Uuid) {
        let existed = self.registry.remove(id).await.is_some();

        if let Err(e) = self.chunk_store.delete_all(id).await {
            tracing::warn!(
                session_id = %id,
                error = %e,
                "Failed to delete staged chunks on cancel"
            );
        }

        tracing::info!(session_id = %id, existed, "Upload session cancelled");
    }

    /// Assemble → digest → inspect → thumbnail, in that order. The assembled
    /// file is exclusively owned by this pipeline until the descriptor is
    /// handed back.
    async fn run_pipeline(
        &self,
        session: &UploadSession,
        expected_hash: Option<String>,
    ) -> Result<AssembledAsset, AppError> {
        let mime_type = content_type_for(&session.original_filename);
        let kind = MediaKind::from_mime(mime_type);
        let file_id = Uuid::new_v4();
        let extension = file_extension(&session.original_filename);

        let storage_key = self.asset_store.asset_key(kind, file_id, &extension);
        let output_path = self
            .asset_store
            .path_for(&storage_key)
            .map_err(|e| AppError::ChunkStorage(e.to_string()))?;

        let size = assemble(
            self.chunk_store.as_ref(),
            session.id,
            session.total_chunks,
            &output_path,
        )
        .await
        .map_err(|e| match e {
            AssembleError::IncompleteChunks {
                received,
                total_chunks,
                ..
            } => AppError::IncompleteChunks {
                received,
                total_chunks,
            },
            other => AppError::assembly_failed("Chunk concatenation failed", other),
        })?;

        if size > session.declared_size {
            self.discard_output(&storage_key).await;
            return Err(AppError::AssemblyFailed {
                message: format!(
                    "Assembled size {} exceeds declared size {}",
                    size, session.declared_size
                ),
                source: None,
            });
        }
        if size < session.declared_size {
            tracing::warn!(
                session_id = %session.id,
                assembled = size,
                declared = session.declared_size,
                "Assembled size is below the declared size"
            );
        }

        let digest = digest_file(&output_path).await;
        if let Some(expected) = expected_hash {
            // A fallback token is not a content fingerprint; verification
            // against it must fail closed rather than pretend to match.
            if !digest.is_content() || digest.value() != expected {
                self.discard_output(&storage_key).await;
                return Err(AppError::AssemblyFailed {
                    message: format!(
                        "Digest mismatch: expected {}, computed {}",
                        expected,
                        digest.value()
                    ),
                    source: None,
                });
            }
        }

        let info = self.inspector.inspect(&output_path, kind, size).await;
        let duration = match &info {
            MediaInfo::Video(video) => video.duration,
            _ => None,
        };

        let thumbnail_key = self.asset_store.thumbnail_key(file_id);
        let thumbnail_path = self
            .asset_store
            .path_for(&thumbnail_key)
            .map_err(|e| AppError::ChunkStorage(e.to_string()))?;
        let has_thumbnail = self
            .thumbnailer
            .generate(&output_path, kind, duration, &thumbnail_path)
            .await;

        Ok(AssembledAsset {
            file_id,
            original_filename: session.original_filename.clone(),
            kind,
            mime_type: mime_type.to_string(),
            size,
            hash: digest.value().to_string(),
            hash_is_content: digest.is_content(),
            url: self.asset_store.url_for(&storage_key),
            storage_key,
            info,
            thumbnail_url: has_thumbnail.then(|| self.asset_store.url_for(&thumbnail_key)),
            thumbnail_key: has_thumbnail.then_some(thumbnail_key),
            uploaded_at: chrono::Utc::now(),
        })
    }

    async fn discard_output(&self, storage_key: &str) {
        if let Err(e) = self.asset_store.delete(storage_key).await {
            tracing::warn!(
                key = %storage_key,
                error = %e,
                "Failed to remove rejected assembly output"
            );
        }
    }
}

fn file_extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("tour.MP4"), "mp4");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("noext"), "");
        assert_eq!(file_extension(".hidden"), "");
    }
}
