//! HTTP request handlers

pub mod chunked_upload;

pub use chunked_upload::{
    cancel_chunked_upload, complete_chunked_upload, get_chunked_upload_progress,
    init_chunked_upload, upload_chunk,
};
