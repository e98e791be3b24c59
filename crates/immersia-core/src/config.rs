//! Configuration module
//!
//! Environment-driven configuration for the upload service: server settings,
//! staging and media directories, external tool paths, thumbnail parameters,
//! and session expiry.

use std::env;

// Common constants
const MAX_CHUNK_COUNT: u32 = 10_000;
const MAX_CHUNK_SIZE_MB: usize = 16;
const THUMBNAIL_SIZE: u32 = 320;
const THUMBNAIL_JPEG_QUALITY: u8 = 80;
const THUMBNAIL_FRAME_OFFSET_PERCENT: f64 = 10.0;
const SESSION_TTL_HOURS: i64 = 24;
const SWEEP_INTERVAL_SECS: u64 = 3600;

/// Application configuration for the upload service.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    /// Root directory for staged chunks, one subdirectory per session.
    pub staging_dir: String,
    /// Root directory for finished assets (videos/, images/, audio/, files/, thumbnails/).
    pub media_dir: String,
    /// Base URL finished assets are served from.
    pub media_base_url: String,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Square edge length of generated thumbnails, in pixels.
    pub thumbnail_size: u32,
    pub thumbnail_jpeg_quality: u8,
    /// Relative offset into a video's duration where the thumbnail frame is taken.
    pub thumbnail_frame_offset_percent: f64,
    pub max_chunk_count: u32,
    pub max_chunk_size_bytes: usize,
    /// Sessions with no chunk activity for this long are garbage-collected.
    pub session_ttl_hours: i64,
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_chunk_size_mb = env::var("MAX_CHUNK_SIZE_MB")
            .unwrap_or_else(|_| MAX_CHUNK_SIZE_MB.to_string())
            .parse::<usize>()?;

        Ok(Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()?,
            cors_origins,
            environment,
            staging_dir: env::var("STAGING_DIR").unwrap_or_else(|_| "data/staging".to_string()),
            media_dir: env::var("MEDIA_DIR").unwrap_or_else(|_| "data/media".to_string()),
            media_base_url: env::var("MEDIA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:4000/media".to_string()),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            thumbnail_size: env::var("THUMBNAIL_SIZE")
                .unwrap_or_else(|_| THUMBNAIL_SIZE.to_string())
                .parse()?,
            thumbnail_jpeg_quality: env::var("THUMBNAIL_JPEG_QUALITY")
                .unwrap_or_else(|_| THUMBNAIL_JPEG_QUALITY.to_string())
                .parse()?,
            thumbnail_frame_offset_percent: env::var("THUMBNAIL_FRAME_OFFSET_PERCENT")
                .unwrap_or_else(|_| THUMBNAIL_FRAME_OFFSET_PERCENT.to_string())
                .parse()?,
            max_chunk_count: env::var("MAX_CHUNK_COUNT")
                .unwrap_or_else(|_| MAX_CHUNK_COUNT.to_string())
                .parse()?,
            max_chunk_size_bytes: max_chunk_size_mb * 1024 * 1024,
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .unwrap_or_else(|_| SESSION_TTL_HOURS.to_string())
                .parse()?,
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| SWEEP_INTERVAL_SECS.to_string())
                .parse()?,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.staging_dir.is_empty() {
            anyhow::bail!("STAGING_DIR must not be empty");
        }
        if self.media_dir.is_empty() {
            anyhow::bail!("MEDIA_DIR must not be empty");
        }
        if self.max_chunk_count == 0 {
            anyhow::bail!("MAX_CHUNK_COUNT must be greater than 0");
        }
        if self.max_chunk_size_bytes == 0 {
            anyhow::bail!("MAX_CHUNK_SIZE_MB must be greater than 0");
        }
        if self.thumbnail_size == 0 {
            anyhow::bail!("THUMBNAIL_SIZE must be greater than 0");
        }
        if !(1..=100).contains(&self.thumbnail_jpeg_quality) {
            anyhow::bail!("THUMBNAIL_JPEG_QUALITY must be between 1 and 100");
        }
        if !(0.0..=100.0).contains(&self.thumbnail_frame_offset_percent) {
            anyhow::bail!("THUMBNAIL_FRAME_OFFSET_PERCENT must be between 0 and 100");
        }
        if self.session_ttl_hours <= 0 {
            anyhow::bail!("SESSION_TTL_HOURS must be greater than 0");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_port: 4000,
            cors_origins: vec!["*".to_string()],
            environment: "development".to_string(),
            staging_dir: "data/staging".to_string(),
            media_dir: "data/media".to_string(),
            media_base_url: "http://localhost:4000/media".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            thumbnail_size: THUMBNAIL_SIZE,
            thumbnail_jpeg_quality: THUMBNAIL_JPEG_QUALITY,
            thumbnail_frame_offset_percent: THUMBNAIL_FRAME_OFFSET_PERCENT,
            max_chunk_count: MAX_CHUNK_COUNT,
            max_chunk_size_bytes: MAX_CHUNK_SIZE_MB * 1024 * 1024,
            session_ttl_hours: SESSION_TTL_HOURS,
            sweep_interval_secs: SWEEP_INTERVAL_SECS,
        }
    }
}
