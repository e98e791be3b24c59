//! Background expiry of abandoned upload sessions.

use chrono::{Duration as ChronoDuration, Utc};
use immersia_storage::ChunkStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::registry::SessionRegistry;

/// Periodically removes sessions with no chunk activity past the TTL,
/// together with their staged chunks. Runs on its own timer, independent of
/// request handling; sessions with a completion in flight are skipped.
pub struct SessionSweeper {
    registry: Arc<SessionRegistry>,
    chunk_store: Arc<dyn ChunkStore>,
    session_ttl: ChronoDuration,
    sweep_interval: Duration,
}

impl SessionSweeper {
    pub fn new(
        registry: Arc<SessionRegistry>,
        chunk_store: Arc<dyn ChunkStore>,
        session_ttl_hours: i64,
        sweep_interval_secs: u64,
    ) -> Self {
        Self {
            registry,
            chunk_store,
            session_ttl: ChronoDuration::hours(session_ttl_hours),
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        }
    }

    /// Start the background sweep task.
    /// Returns a JoinHandle for graceful shutdown.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(self.sweep_interval);

            loop {
                sweep_interval.tick().await;

                let expired = self.sweep().await;
                if expired > 0 {
                    tracing::info!(expired, "Idle upload sessions expired");
                }
            }
        })
    }

    /// Expire idle sessions once; returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let cutoff = Utc::now() - self.session_ttl;
        let idle = self.registry.idle_sessions(cutoff).await;
        let mut expired = 0;

        for id in idle {
            if self.registry.remove(id).await.is_none() {
                continue;
            }
            expired += 1;

            if let Err(e) = self.chunk_store.delete_all(id).await {
                tracing::warn!(
                    session_id = %id,
                    error = %e,
                    "Failed to delete staged chunks for expired session"
                );
            } else {
                tracing::info!(session_id = %id, "Expired idle upload session");
            }
        }

        expired
    }
}
