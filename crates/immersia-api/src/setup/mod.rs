//! Application initialization: storage, services, and routes.

pub mod routes;
pub mod server;

use anyhow::{Context, Result};
use axum::Router;
use immersia_core::Config;
use immersia_storage::{AssetStore, ChunkStore, LocalChunkStore};
use std::sync::Arc;

use crate::registry::SessionRegistry;
use crate::services::{SessionSweeper, UploadService};
use crate::state::AppState;

/// Build the application state and router, and start the session sweeper.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, Router<()>)> {
    config.validate()?;

    let chunk_store: Arc<dyn ChunkStore> = Arc::new(
        LocalChunkStore::new(&config.staging_dir)
            .await
            .context("Failed to initialize chunk staging store")?,
    );

    let asset_store = Arc::new(
        AssetStore::new(&config.media_dir, config.media_base_url.clone())
            .await
            .context("Failed to initialize asset store")?,
    );

    let registry = Arc::new(SessionRegistry::new());

    let uploads = Arc::new(
        UploadService::new(
            &config,
            registry.clone(),
            chunk_store.clone(),
            asset_store,
        )
        .context("Failed to initialize upload service")?,
    );

    let sweeper = Arc::new(SessionSweeper::new(
        registry.clone(),
        chunk_store,
        config.session_ttl_hours,
        config.sweep_interval_secs,
    ));
    sweeper.start();

    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
        uploads,
    });

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
