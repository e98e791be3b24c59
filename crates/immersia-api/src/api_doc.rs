//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use immersia_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Immersia Upload API",
        version = "0.1.0",
        description = "Chunked, resumable upload API for immersive media assets. Uploads are staged chunk by chunk, assembled on completion, verified by content digest, and enriched with probed metadata and a thumbnail. All endpoints are versioned under /api/v0/."
    ),
    paths(
        handlers::chunked_upload::init_chunked_upload,
        handlers::chunked_upload::upload_chunk,
        handlers::chunked_upload::get_chunked_upload_progress,
        handlers::chunked_upload::complete_chunked_upload,
        handlers::chunked_upload::cancel_chunked_upload,
    ),
    components(schemas(
        handlers::chunked_upload::InitChunkedUploadRequest,
        handlers::chunked_upload::InitChunkedUploadResponse,
        handlers::chunked_upload::UploadChunkResponse,
        handlers::chunked_upload::ChunkedUploadProgressResponse,
        handlers::chunked_upload::CompleteChunkedUploadRequest,
        models::AssembledAsset,
        models::MediaKind,
        models::MediaInfo,
        models::VideoInfo,
        models::ImageInfo,
        models::AudioInfo,
        models::OtherInfo,
        models::UploadStatus,
        error::ErrorResponse,
    )),
    tags(
        (name = "uploads", description = "Chunked upload lifecycle")
    )
)]
pub struct ApiDoc;
