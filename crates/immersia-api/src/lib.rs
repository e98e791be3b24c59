//! Immersia API Library
//!
//! This crate provides the HTTP API handlers, upload orchestration, and
//! application setup.

// Module declarations
mod api_doc;
pub mod constants;
mod handlers;
pub mod setup;
mod telemetry;

// Public modules
pub mod error;
pub mod registry;
pub mod services;
pub mod state;

// Re-exports
pub use api_doc::ApiDoc;
pub use error::ErrorResponse;
pub use registry::SessionRegistry;
pub use services::{SessionSweeper, UploadProgress, UploadService};
pub use telemetry::init_telemetry;
