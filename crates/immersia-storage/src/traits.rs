//! Chunk store abstraction trait
//!
//! This module defines the ChunkStore trait for the staging area that holds
//! uploaded byte ranges while a session is in flight.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

/// Chunk staging errors
#[derive(Debug, Error)]
pub enum ChunkStoreError {
    #[error("Chunk write failed: {0}")]
    WriteFailed(String),

    #[error("Chunk read failed: {0}")]
    ReadFailed(String),

    #[error("Chunk delete failed: {0}")]
    DeleteFailed(String),

    #[error("Chunk not found: session {session_id} index {index}")]
    NotFound { session_id: Uuid, index: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for chunk store operations
pub type ChunkStoreResult<T> = Result<T, ChunkStoreError>;

/// Identifier-scoped staging area for raw chunk bytes.
///
/// Chunks may arrive out of order and with gaps; that is valid mid-upload
/// state. Writes to the same `(session, index)` slot overwrite (last write
/// wins), but no ordering is imposed across different indices.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Stage the bytes for one chunk, overwriting any prior bytes at that slot.
    async fn put_chunk(&self, session_id: Uuid, index: u32, data: Bytes) -> ChunkStoreResult<()>;

    /// Read back the staged bytes for one chunk.
    async fn read_chunk(&self, session_id: Uuid, index: u32) -> ChunkStoreResult<Vec<u8>>;

    /// The set of chunk indices currently staged for a session.
    async fn list_indices(&self, session_id: Uuid) -> ChunkStoreResult<BTreeSet<u32>>;

    /// Remove every staged chunk for a session. Removing a session that has
    /// no staged chunks is not an error; used by both cancel and
    /// post-assembly cleanup.
    async fn delete_all(&self, session_id: Uuid) -> ChunkStoreResult<()>;
}
