//! Application services

pub mod sweeper;
pub mod upload;

pub use sweeper::SessionSweeper;
pub use upload::{UploadProgress, UploadService};
