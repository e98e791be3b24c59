//! Upload session model and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of an upload session.
///
/// Transitions are one-directional except repeated chunk arrivals in
/// `Uploading`, and `Failed → Completing` when a client retries completion
/// after an assembly failure (chunks are retained across that failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Initializing,
    Uploading,
    Completing,
    Completed,
    Failed,
    Cancelled,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Initializing => "initializing",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completing => "completing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
            UploadStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a completion attempt may start from this status.
    pub fn can_begin_completion(&self) -> bool {
        matches!(self, UploadStatus::Uploading | UploadStatus::Failed)
    }
}

/// One in-flight or completed resumable upload.
///
/// Created at init, mutated by chunk arrivals and completion, discarded on
/// successful completion or cancel. Owned exclusively by the session registry.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub id: Uuid,
    pub original_filename: String,
    /// Total file size declared at init; immutable afterward.
    pub declared_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u32,
    /// Indices of chunks received so far. Grows monotonically; re-uploading
    /// an index overwrites the staged bytes without duplicating the entry.
    pub received_chunks: BTreeSet<u32>,
    pub status: UploadStatus,
    pub created_at: DateTime<Utc>,
    /// Updated on every chunk arrival; drives idle-session expiry.
    pub last_activity_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(
        original_filename: String,
        declared_size: u64,
        chunk_size: u64,
        total_chunks: u32,
    ) -> Self {
        let now = Utc::now();
        UploadSession {
            id: Uuid::new_v4(),
            original_filename,
            declared_size,
            chunk_size,
            total_chunks,
            received_chunks: BTreeSet::new(),
            status: UploadStatus::Initializing,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Record a chunk arrival. Returns true if the index was not seen before.
    pub fn record_chunk(&mut self, index: u32) -> bool {
        self.last_activity_at = Utc::now();
        self.received_chunks.insert(index)
    }

    pub fn received_count(&self) -> usize {
        self.received_chunks.len()
    }

    /// All indices in `[0, total_chunks)` present, no gaps.
    pub fn is_complete(&self) -> bool {
        self.received_chunks.len() == self.total_chunks as usize
            && (0..self.total_chunks).all(|i| self.received_chunks.contains(&i))
    }
}
