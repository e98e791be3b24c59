//! End-to-end tests of the upload orchestrator: init → chunks → complete,
//! plus cancellation, retry, and degraded-mode behavior.
//!
//! Run from workspace root: `cargo test -p immersia-api --test upload_lifecycle_test`.

use bytes::Bytes;
use immersia_api::registry::SessionRegistry;
use immersia_api::services::UploadService;
use immersia_core::models::{MediaKind, UploadStatus};
use immersia_core::{AppError, Config};
use immersia_processing::digest_bytes;
use immersia_storage::{AssetStore, ChunkStore, LocalChunkStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

struct TestHarness {
    service: UploadService,
    registry: Arc<SessionRegistry>,
    chunk_store: Arc<LocalChunkStore>,
    media_dir: PathBuf,
    _root: TempDir,
}

async fn harness() -> TestHarness {
    let root = TempDir::new().unwrap();
    let staging_dir = root.path().join("staging");
    let media_dir = root.path().join("media");

    let config = Config {
        staging_dir: staging_dir.to_string_lossy().into_owned(),
        media_dir: media_dir.to_string_lossy().into_owned(),
        ..Config::default()
    };

    let registry = Arc::new(SessionRegistry::new());
    let chunk_store = Arc::new(LocalChunkStore::new(&staging_dir).await.unwrap());
    let asset_store = Arc::new(
        AssetStore::new(&media_dir, config.media_base_url.clone())
            .await
            .unwrap(),
    );

    let service = UploadService::new(
        &config,
        registry.clone(),
        chunk_store.clone(),
        asset_store,
    )
    .unwrap();

    TestHarness {
        service,
        registry,
        chunk_store,
        media_dir,
        _root: root,
    }
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                found.extend(files_under(&path));
            } else {
                found.push(path);
            }
        }
    }
    found
}

#[tokio::test]
async fn test_init_validates_chunk_arithmetic() {
    let h = harness().await;

    // ceil(15_000_000 / 5_000_000) = 3; declaring 4 must be rejected
    let err = h
        .service
        .init("tour.bin".to_string(), 15_000_000, 5_000_000, 4)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidParameters(_)));

    let err = h
        .service
        .init("tour.bin".to_string(), 0, 5_000_000, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidParameters(_)));

    let err = h
        .service
        .init("tour.bin".to_string(), 10, 0, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidParameters(_)));

    // Consistent arithmetic succeeds, including a short final chunk
    let session = h
        .service
        .init("tour.bin".to_string(), 10_500_000, 5_000_000, 3)
        .await
        .unwrap();
    assert_eq!(session.total_chunks, 3);
    assert_eq!(session.status, UploadStatus::Uploading);
}

#[tokio::test]
async fn test_full_lifecycle_out_of_order_chunks() {
    let h = harness().await;

    let chunk_len = 5_000_000usize;
    let chunks: Vec<Vec<u8>> = (0..3u8)
        .map(|i| vec![i.wrapping_mul(37).wrapping_add(11); chunk_len])
        .collect();
    let source: Vec<u8> = chunks.iter().flatten().copied().collect();
    let expected_hash = digest_bytes(&source);

    let session = h
        .service
        .init("capture.bin".to_string(), 15_000_000, 5_000_000, 3)
        .await
        .unwrap();
    let id = session.id;

    // Arrive out of order: 2, 0, 1
    for index in [2u32, 0, 1] {
        h.service
            .upload_chunk(id, index, Bytes::from(chunks[index as usize].clone()))
            .await
            .unwrap();
    }

    let progress = h.service.progress(id).await.unwrap();
    assert_eq!(progress.received_chunks, vec![0, 1, 2]);
    assert_eq!(progress.total_chunks, 3);
    assert_eq!(progress.status, UploadStatus::Uploading);

    let asset = h.service.complete(id, None).await.unwrap();

    assert_eq!(asset.size, 15_000_000);
    assert_eq!(asset.hash, expected_hash);
    assert!(asset.hash_is_content);
    assert_eq!(asset.kind, MediaKind::Other);
    assert!(asset.thumbnail_key.is_none());

    // Assembled output is byte-for-byte the ascending concatenation
    let output = h.media_dir.join(&asset.storage_key);
    let assembled = std::fs::read(&output).unwrap();
    assert_eq!(digest_bytes(&assembled), expected_hash);

    // Session state and staged chunks are discarded
    let err = h.service.progress(id).await.unwrap_err();
    assert!(matches!(err, AppError::UnknownSession(_)));
    assert!(h.chunk_store.list_indices(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_chunk_upload_overwrites() {
    let h = harness().await;

    let session = h
        .service
        .init("take.bin".to_string(), 8, 4, 2)
        .await
        .unwrap();
    let id = session.id;

    h.service
        .upload_chunk(id, 0, Bytes::from_static(b"AAAA"))
        .await
        .unwrap();
    h.service
        .upload_chunk(id, 1, Bytes::from_static(b"tail"))
        .await
        .unwrap();
    // Re-upload index 0 with different bytes; the second write must win
    h.service
        .upload_chunk(id, 0, Bytes::from_static(b"BBBB"))
        .await
        .unwrap();

    let progress = h.service.progress(id).await.unwrap();
    assert_eq!(progress.received_chunks, vec![0, 1]);

    let asset = h.service.complete(id, None).await.unwrap();
    let assembled = std::fs::read(h.media_dir.join(&asset.storage_key)).unwrap();
    assert_eq!(assembled, b"BBBBtail");
}

#[tokio::test]
async fn test_chunk_index_out_of_range() {
    let h = harness().await;

    let session = h
        .service
        .init("clip.bin".to_string(), 8, 4, 2)
        .await
        .unwrap();

    let err = h
        .service
        .upload_chunk(session.id, 2, Bytes::from_static(b"nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidChunkIndex { index: 2, .. }));

    let err = h
        .service
        .upload_chunk(Uuid::new_v4(), 0, Bytes::from_static(b"nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownSession(_)));
}

#[tokio::test]
async fn test_complete_with_gaps_leaves_no_output() {
    let h = harness().await;

    let session = h
        .service
        .init("partial.bin".to_string(), 12, 4, 3)
        .await
        .unwrap();
    let id = session.id;

    h.service
        .upload_chunk(id, 0, Bytes::from_static(b"aaaa"))
        .await
        .unwrap();
    h.service
        .upload_chunk(id, 1, Bytes::from_static(b"bbbb"))
        .await
        .unwrap();

    let err = h.service.complete(id, None).await.unwrap_err();
    match err {
        AppError::IncompleteChunks {
            received,
            total_chunks,
        } => {
            assert_eq!(received, 2);
            assert_eq!(total_chunks, 3);
        }
        other => panic!("expected IncompleteChunks, got {:?}", other),
    }

    // No file may appear anywhere under the media root
    assert!(files_under(&h.media_dir).is_empty());

    // The session is still usable: finish the upload and complete
    let progress = h.service.progress(id).await.unwrap();
    assert_eq!(progress.status, UploadStatus::Uploading);

    h.service
        .upload_chunk(id, 2, Bytes::from_static(b"cccc"))
        .await
        .unwrap();
    let asset = h.service.complete(id, None).await.unwrap();
    assert_eq!(asset.size, 12);
}

#[tokio::test]
async fn test_cancel_is_idempotent_and_discards_state() {
    let h = harness().await;

    let session = h
        .service
        .init("gone.bin".to_string(), 4, 4, 1)
        .await
        .unwrap();
    let id = session.id;

    h.service
        .upload_chunk(id, 0, Bytes::from_static(b"data"))
        .await
        .unwrap();

    h.service.cancel(id).await;
    assert!(h.chunk_store.list_indices(id).await.unwrap().is_empty());

    // Cancelling again, or cancelling an unknown identifier, is not an error
    h.service.cancel(id).await;
    h.service.cancel(Uuid::new_v4()).await;

    // A subsequent complete must see no session, never a half-state
    let err = h.service.complete(id, None).await.unwrap_err();
    assert!(matches!(err, AppError::UnknownSession(_)));

    // A late-arriving chunk is dropped rather than resurrecting the session
    let err = h
        .service
        .upload_chunk(id, 0, Bytes::from_static(b"late"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownSession(_)));
    assert!(h.chunk_store.list_indices(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expected_hash_mismatch_fails_and_retains_chunks() {
    let h = harness().await;

    let session = h
        .service
        .init("verify.bin".to_string(), 4, 4, 1)
        .await
        .unwrap();
    let id = session.id;

    h.service
        .upload_chunk(id, 0, Bytes::from_static(b"data"))
        .await
        .unwrap();

    let err = h
        .service
        .complete(id, Some("deadbeef".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AssemblyFailed { .. }));

    // Rejected output is removed; chunks stay for a retry
    assert!(files_under(&h.media_dir).is_empty());
    assert_eq!(h.chunk_store.list_indices(id).await.unwrap().len(), 1);

    let progress = h.service.progress(id).await.unwrap();
    assert_eq!(progress.status, UploadStatus::Failed);

    // Retry with the right digest succeeds without re-uploading
    let asset = h
        .service
        .complete(id, Some(digest_bytes(b"data")))
        .await
        .unwrap();
    assert_eq!(asset.size, 4);
}

#[tokio::test]
async fn test_concurrent_completion_is_rejected() {
    let h = harness().await;

    let session = h
        .service
        .init("race.bin".to_string(), 4, 4, 1)
        .await
        .unwrap();
    let id = session.id;

    h.service
        .upload_chunk(id, 0, Bytes::from_static(b"data"))
        .await
        .unwrap();

    // Claim the completion pipeline, as an in-flight complete would
    h.registry.begin_completion(id).await.unwrap();

    let err = h.service.complete(id, None).await.unwrap_err();
    assert!(matches!(err, AppError::AssemblyInProgress(_)));

    // Once the claim is released, completion proceeds
    h.registry
        .abort_completion(id, UploadStatus::Uploading)
        .await;
    h.service.complete(id, None).await.unwrap();
}

#[tokio::test]
async fn test_oversized_assembly_is_rejected() {
    let h = harness().await;

    let session = h
        .service
        .init("bloat.bin".to_string(), 4, 4, 1)
        .await
        .unwrap();
    let id = session.id;

    // Stage more bytes than declared at init
    h.service
        .upload_chunk(id, 0, Bytes::from_static(b"way too many bytes"))
        .await
        .unwrap();

    let err = h.service.complete(id, None).await.unwrap_err();
    assert!(matches!(err, AppError::AssemblyFailed { .. }));
    assert!(files_under(&h.media_dir).is_empty());

    let progress = h.service.progress(id).await.unwrap();
    assert_eq!(progress.status, UploadStatus::Failed);
}

#[tokio::test]
async fn test_corrupt_image_degrades_without_failing() {
    let h = harness().await;

    // A .png that is not decodable: metadata and thumbnail degrade, the
    // upload itself still succeeds
    let payload = b"definitely not a png";
    let session = h
        .service
        .init(
            "pano.png".to_string(),
            payload.len() as u64,
            payload.len() as u64,
            1,
        )
        .await
        .unwrap();
    let id = session.id;

    h.service
        .upload_chunk(id, 0, Bytes::from_static(payload))
        .await
        .unwrap();

    let asset = h.service.complete(id, None).await.unwrap();
    assert_eq!(asset.kind, MediaKind::Image);
    assert_eq!(asset.mime_type, "image/png");
    assert!(asset.thumbnail_key.is_none());

    match asset.info {
        immersia_core::models::MediaInfo::Image(info) => {
            assert_eq!(info.size_bytes, payload.len() as u64);
            assert_eq!(info.width, None);
            assert_eq!(info.height, None);
        }
        other => panic!("expected image info, got {:?}", other),
    }
}
