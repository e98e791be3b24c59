//! Immersia Processing Library
//!
//! Completion-pipeline stages for assembled uploads: chunk assembly, content
//! digests, metadata inspection, and thumbnail generation.

pub mod assembler;
pub mod digest;
pub mod inspector;
pub mod thumbnail;

// Re-export commonly used types
pub use assembler::{assemble, AssembleError};
pub use digest::{digest_bytes, digest_file, Digest};
pub use inspector::MediaInspector;
pub use thumbnail::ThumbnailGenerator;
