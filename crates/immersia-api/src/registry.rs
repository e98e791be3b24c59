//! In-memory upload session registry.
//!
//! Created once at service startup and injected into the orchestrator; all
//! session state lives here for the duration of an upload. The registry also
//! arbitrates completion: `begin_completion` grants exclusive occupancy of
//! the completion pipeline for a session via the `Completing` status.

use chrono::{DateTime, Utc};
use immersia_core::models::{UploadSession, UploadStatus};
use immersia_core::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Outcome of recording a chunk arrival against a session.
#[derive(Debug)]
pub enum ChunkRecordOutcome {
    /// Index added (or re-added) to the received set.
    Recorded { newly_received: bool },
    /// Session was cancelled or completed while the bytes were in flight;
    /// the staged chunk must be dropped, not resurrect the session.
    SessionGone,
    /// Session exists but is not accepting chunks in its current status.
    NotAccepting(UploadStatus),
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, UploadSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: UploadSession) {
        self.sessions.write().await.insert(session.id, session);
    }

    pub async fn get(&self, id: Uuid) -> Option<UploadSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Validate a chunk upload against current session state, before any
    /// bytes are staged.
    pub async fn validate_chunk(&self, id: Uuid, index: u32) -> Result<(), AppError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(&id)
            .ok_or_else(|| AppError::UnknownSession(id.to_string()))?;

        if session.status != UploadStatus::Uploading {
            return Err(AppError::InvalidParameters(format!(
                "Session {} is {}, not accepting chunks",
                id,
                session.status.as_str()
            )));
        }

        if index >= session.total_chunks {
            return Err(AppError::InvalidChunkIndex {
                index,
                total_chunks: session.total_chunks,
            });
        }

        Ok(())
    }

    /// Record a chunk arrival after its bytes were staged.
    pub async fn record_chunk(&self, id: Uuid, index: u32) -> ChunkRecordOutcome {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            None => ChunkRecordOutcome::SessionGone,
            Some(session) if session.status != UploadStatus::Uploading => {
                ChunkRecordOutcome::NotAccepting(session.status)
            }
            Some(session) => ChunkRecordOutcome::Recorded {
                newly_received: session.record_chunk(index),
            },
        }
    }

    /// Claim the completion pipeline for a session.
    ///
    /// At most one completion runs per session at a time: a concurrent call
    /// while one is in flight is rejected with `AssemblyInProgress`. Returns
    /// a snapshot of the session taken at claim time.
    pub async fn begin_completion(&self, id: Uuid) -> Result<UploadSession, AppError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::UnknownSession(id.to_string()))?;

        match session.status {
            UploadStatus::Completing => Err(AppError::AssemblyInProgress(id.to_string())),
            status if status.can_begin_completion() => {
                session.status = UploadStatus::Completing;
                Ok(session.clone())
            }
            status => Err(AppError::InvalidParameters(format!(
                "Session {} is {}, completion not allowed",
                id,
                status.as_str()
            ))),
        }
    }

    /// Release a claimed completion without success, restoring the given
    /// status. Returns false when the session no longer exists (cancelled
    /// while the pipeline was running).
    pub async fn abort_completion(&self, id: Uuid, status: UploadStatus) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) => {
                session.status = status;
                true
            }
            None => false,
        }
    }

    /// Finish a successful completion: the session state is discarded.
    /// Returns false when cancel got there first.
    pub async fn complete_and_remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Remove a session unconditionally (cancel). Idempotent.
    pub async fn remove(&self, id: Uuid) -> Option<UploadSession> {
        self.sessions.write().await.remove(&id)
    }

    /// Sessions with no chunk activity since `cutoff`, skipping ones with a
    /// completion in flight.
    pub async fn idle_sessions(&self, cutoff: DateTime<Utc>) -> Vec<Uuid> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.status != UploadStatus::Completing && s.last_activity_at < cutoff)
            .map(|s| s.id)
            .collect()
    }
}
