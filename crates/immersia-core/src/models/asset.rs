//! Finished asset model: media kind classification, per-kind metadata, and
//! the asset descriptor returned to the content service on completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Media kind of an assembled asset, derived from the MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
    Other,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video/") {
            MediaKind::Video
        } else if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("audio/") {
            MediaKind::Audio
        } else {
            MediaKind::Other
        }
    }

    /// Output subdirectory for this kind under the media root.
    pub fn subdir(&self) -> &'static str {
        match self {
            MediaKind::Video => "videos",
            MediaKind::Image => "images",
            MediaKind::Audio => "audio",
            MediaKind::Other => "files",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Other => "other",
        }
    }
}

/// MIME type inferred from a filename extension.
///
/// The chunked protocol carries no content type, so classification is driven
/// by the original filename alone.
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match extension.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// Metadata extracted for a video asset. Fields other than the byte size are
/// best-effort: probing a corrupt file leaves them unset rather than failing
/// the upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoInfo {
    pub size_bytes: u64,
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codec: Option<String>,
    pub frame_rate: Option<f32>,
    pub bitrate: Option<u64>,
}

/// Metadata extracted for an image asset.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageInfo {
    pub size_bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
}

/// Metadata extracted for an audio asset.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AudioInfo {
    pub size_bytes: u64,
    pub duration: Option<f64>,
    pub codec: Option<String>,
    pub bitrate: Option<u64>,
}

/// Metadata for any other asset kind.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OtherInfo {
    pub size_bytes: u64,
}

/// Per-kind metadata, selected by the asset's `MediaKind` discriminant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub enum MediaInfo {
    Video(VideoInfo),
    Image(ImageInfo),
    Audio(AudioInfo),
    Other(OtherInfo),
}

impl MediaInfo {
    pub fn size_bytes(&self) -> u64 {
        match self {
            MediaInfo::Video(info) => info.size_bytes,
            MediaInfo::Image(info) => info.size_bytes,
            MediaInfo::Audio(info) => info.size_bytes,
            MediaInfo::Other(info) => info.size_bytes,
        }
    }
}

/// Durable output of a completed upload session.
///
/// Created once at completion and immutable thereafter; the content service
/// owns persistence and eventual deletion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssembledAsset {
    pub file_id: Uuid,
    pub original_filename: String,
    pub kind: MediaKind,
    pub mime_type: String,
    pub size: u64,
    /// Content digest of the assembled file. When `hash_is_content` is false
    /// this is a random substitute token, not a content fingerprint.
    pub hash: String,
    pub hash_is_content: bool,
    pub storage_key: String,
    pub url: String,
    pub info: MediaInfo,
    pub thumbnail_key: Option<String>,
    pub thumbnail_url: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}
