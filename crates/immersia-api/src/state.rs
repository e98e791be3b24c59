//! Application state.
//!
//! Built once at startup; the session registry and upload service are
//! injected here rather than living as module-level singletons.

use immersia_core::Config;
use std::sync::Arc;

use crate::registry::SessionRegistry;
use crate::services::UploadService;

pub struct AppState {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub uploads: Arc<UploadService>,
}
