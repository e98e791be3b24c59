//! Chunked upload handlers.
//!
//! Resumable uploads: init a session, stream chunks in any order, then
//! complete to assemble and enrich the asset, or cancel to discard.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use immersia_core::models::AssembledAsset;
use immersia_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Request to start a chunked upload
#[derive(Debug, Deserialize, ToSchema)]
pub struct InitChunkedUploadRequest {
    /// Original filename
    pub filename: String,
    /// Total file size in bytes
    pub file_size: u64,
    /// Size of each chunk in bytes
    pub chunk_size: u64,
    /// Declared number of chunks; must equal ceil(file_size / chunk_size)
    pub total_chunks: u32,
}

/// Response for starting a chunked upload
#[derive(Debug, Serialize, ToSchema)]
pub struct InitChunkedUploadResponse {
    /// Upload session identifier
    pub identifier: Uuid,
    /// Total number of chunks
    pub total_chunks: u32,
    /// Chunk size in bytes
    pub chunk_size: u64,
}

/// Acknowledgement for a staged chunk
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadChunkResponse {
    /// Chunk index (0-based)
    pub chunk_number: u32,
    pub received: bool,
}

/// Response for upload progress
#[derive(Debug, Serialize, ToSchema)]
pub struct ChunkedUploadProgressResponse {
    /// Upload session identifier
    pub identifier: Uuid,
    /// Indices received so far, ascending
    pub received_chunks: Vec<u32>,
    /// Total number of chunks
    pub total_chunks: u32,
    /// Session status
    pub status: String,
}

/// Request to complete a chunked upload
#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteChunkedUploadRequest {
    /// Upload session identifier
    pub identifier: Uuid,
    /// Optional expected content digest (hex SHA-256) to verify the
    /// assembled file against
    #[serde(default)]
    pub expected_hash: Option<String>,
}

/// Start a chunked upload session
#[utoipa::path(
    post,
    path = "/api/v0/upload/chunk/init",
    tag = "uploads",
    request_body = InitChunkedUploadRequest,
    responses(
        (status = 200, description = "Upload session started", body = InitChunkedUploadResponse),
        (status = 400, description = "Invalid parameters", body = ErrorResponse)
    )
)]
pub async fn init_chunked_upload(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InitChunkedUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let session = state
        .uploads
        .init(
            request.filename,
            request.file_size,
            request.chunk_size,
            request.total_chunks,
        )
        .await?;

    Ok(Json(InitChunkedUploadResponse {
        identifier: session.id,
        total_chunks: session.total_chunks,
        chunk_size: session.chunk_size,
    }))
}

/// Upload a single chunk
#[utoipa::path(
    post,
    path = "/api/v0/upload/chunk/upload",
    tag = "uploads",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Chunk staged", body = UploadChunkResponse),
        (status = 400, description = "Invalid chunk", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut identifier: Option<Uuid> = None;
    let mut chunk_number: Option<u32> = None;
    let mut chunk: Option<bytes::Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::InvalidParameters(format!("Invalid multipart body: {}", e))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "identifier" => {
                let text = field.text().await.map_err(|e| {
                    AppError::InvalidParameters(format!("Invalid identifier field: {}", e))
                })?;
                identifier = Some(text.parse().map_err(|_| {
                    AppError::InvalidParameters(format!("Invalid identifier: {}", text))
                })?);
            }
            "chunk_number" => {
                let text = field.text().await.map_err(|e| {
                    AppError::InvalidParameters(format!("Invalid chunk_number field: {}", e))
                })?;
                chunk_number = Some(text.parse().map_err(|_| {
                    AppError::InvalidParameters(format!("Invalid chunk_number: {}", text))
                })?);
            }
            "chunk" => {
                chunk = Some(field.bytes().await.map_err(|e| {
                    AppError::InvalidParameters(format!("Failed to read chunk bytes: {}", e))
                })?);
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let identifier = identifier
        .ok_or_else(|| AppError::InvalidParameters("Missing identifier field".to_string()))?;
    let chunk_number = chunk_number
        .ok_or_else(|| AppError::InvalidParameters("Missing chunk_number field".to_string()))?;
    let chunk =
        chunk.ok_or_else(|| AppError::InvalidParameters("Missing chunk field".to_string()))?;

    if chunk.is_empty() {
        return Err(HttpAppError::from(AppError::InvalidParameters(
            "Chunk must not be empty".to_string(),
        )));
    }

    state.uploads.upload_chunk(identifier, chunk_number, chunk).await?;

    Ok(Json(UploadChunkResponse {
        chunk_number,
        received: true,
    }))
}

/// Get upload progress
#[utoipa::path(
    get,
    path = "/api/v0/upload/chunk/{identifier}/progress",
    tag = "uploads",
    params(
        ("identifier" = Uuid, Path, description = "Upload session identifier")
    ),
    responses(
        (status = 200, description = "Upload progress", body = ChunkedUploadProgressResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn get_chunked_upload_progress(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let progress = state.uploads.progress(identifier).await?;

    Ok(Json(ChunkedUploadProgressResponse {
        identifier,
        received_chunks: progress.received_chunks,
        total_chunks: progress.total_chunks,
        status: progress.status.as_str().to_string(),
    }))
}

/// Complete a chunked upload by assembling chunks
#[utoipa::path(
    post,
    path = "/api/v0/upload/chunk/complete",
    tag = "uploads",
    request_body = CompleteChunkedUploadRequest,
    responses(
        (status = 200, description = "Upload completed", body = AssembledAsset),
        (status = 400, description = "Incomplete chunks", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Completion already running", body = ErrorResponse),
        (status = 500, description = "Assembly failed", body = ErrorResponse)
    )
)]
pub async fn complete_chunked_upload(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompleteChunkedUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let asset = state
        .uploads
        .complete(request.identifier, request.expected_hash)
        .await?;

    Ok(Json(asset))
}

/// Cancel a chunked upload
#[utoipa::path(
    delete,
    path = "/api/v0/upload/chunk/{identifier}",
    tag = "uploads",
    params(
        ("identifier" = Uuid, Path, description = "Upload session identifier")
    ),
    responses(
        (status = 200, description = "Upload cancelled (idempotent)")
    )
)]
pub async fn cancel_chunked_upload(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<Uuid>,
) -> impl IntoResponse {
    state.uploads.cancel(identifier).await;
    StatusCode::OK
}
