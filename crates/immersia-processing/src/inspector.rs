//! Media inspector - type-specific metadata extraction.
//!
//! Metadata extraction is advisory: a corrupt or unreadable file degrades to
//! a partial info object carrying at least the byte size, never an error that
//! blocks the upload.

use anyhow::{anyhow, Context, Result};
use immersia_core::models::{AudioInfo, ImageInfo, MediaInfo, MediaKind, OtherInfo, VideoInfo};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Validate that a path doesn't contain shell metacharacters or dangerous sequences
fn validate_path(path: &str) -> Result<()> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("Path contains dangerous characters: {}", path));
    }

    if path.contains("..") {
        return Err(anyhow!("Path contains directory traversal: {}", path));
    }

    Ok(())
}

/// Validate and canonicalize a file path to prevent directory traversal
fn validate_and_canonicalize_path(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();
    validate_path(&path_str)?;

    path.canonicalize()
        .map_err(|e| anyhow!("Failed to canonicalize path: {}", e))
}

pub struct MediaInspector {
    ffprobe_path: String,
}

impl MediaInspector {
    pub fn new(ffprobe_path: String) -> Result<Self> {
        validate_path(&ffprobe_path)
            .context("Invalid ffprobe_path: contains dangerous characters")?;

        if !ffprobe_path.chars().all(|c| {
            c.is_alphanumeric() || c == '/' || c == '-' || c == '_' || c == '.' || c == '\\'
        }) {
            return Err(anyhow!("Invalid ffprobe_path: contains unsafe characters"));
        }

        Ok(Self { ffprobe_path })
    }

    /// Derive type-specific metadata for an assembled file.
    ///
    /// Never fails: probe errors are logged and leave the optional fields
    /// unset, with `size_bytes` always populated from the assembled size.
    #[tracing::instrument(skip(self, path), fields(path = %path.display(), kind = kind.as_str()))]
    pub async fn inspect(&self, path: &Path, kind: MediaKind, size_bytes: u64) -> MediaInfo {
        match kind {
            MediaKind::Video => {
                let mut info = VideoInfo {
                    size_bytes,
                    duration: None,
                    width: None,
                    height: None,
                    codec: None,
                    frame_rate: None,
                    bitrate: None,
                };
                match self.probe(path, "v:0").await {
                    Ok(probe) => {
                        info.duration = probe.duration;
                        info.width = probe.width;
                        info.height = probe.height;
                        info.codec = probe.codec;
                        info.frame_rate = probe.frame_rate;
                        info.bitrate = probe.bitrate;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Video probe failed; returning partial info");
                    }
                }
                MediaInfo::Video(info)
            }
            MediaKind::Image => {
                let mut info = ImageInfo {
                    size_bytes,
                    width: None,
                    height: None,
                    format: None,
                };
                match inspect_image(path).await {
                    Ok((width, height, format)) => {
                        info.width = Some(width);
                        info.height = Some(height);
                        info.format = Some(format);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Image decode failed; returning partial info");
                    }
                }
                MediaInfo::Image(info)
            }
            MediaKind::Audio => {
                let mut info = AudioInfo {
                    size_bytes,
                    duration: None,
                    codec: None,
                    bitrate: None,
                };
                match self.probe(path, "a:0").await {
                    Ok(probe) => {
                        info.duration = probe.duration;
                        info.codec = probe.codec;
                        info.bitrate = probe.bitrate;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Audio probe failed; returning partial info");
                    }
                }
                MediaInfo::Audio(info)
            }
            MediaKind::Other => MediaInfo::Other(OtherInfo { size_bytes }),
        }
    }

    /// Run ffprobe over the first stream of the given selector and parse the
    /// JSON output.
    async fn probe(&self, media_path: &Path, stream_selector: &str) -> Result<ProbeOutput> {
        let start = std::time::Instant::now();

        let validated_path =
            validate_and_canonicalize_path(media_path).context("Invalid media path")?;

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                stream_selector,
            ])
            .arg(&validated_path)
            .output()
            .await
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let probe_data: serde_json::Value =
            serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe output")?;

        let stream = probe_data["streams"]
            .get(0)
            .ok_or_else(|| anyhow!("No matching stream found"))?;

        let format = &probe_data["format"];

        let duration = format["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok());

        let width = stream["width"].as_u64().map(|w| w as u32);
        let height = stream["height"].as_u64().map(|h| h as u32);

        let codec = stream["codec_name"].as_str().map(String::from);

        let bitrate = format["bit_rate"]
            .as_str()
            .and_then(|b| b.parse::<u64>().ok());

        let frame_rate = stream["r_frame_rate"].as_str().and_then(|r| {
            let parts: Vec<&str> = r.split('/').collect();
            if parts.len() == 2 {
                let num: f32 = parts[0].parse().ok()?;
                let den: f32 = parts[1].parse().ok()?;
                if den != 0.0 {
                    Some(num / den)
                } else {
                    None
                }
            } else {
                None
            }
        });

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            media_duration = duration,
            width,
            height,
            codec = codec.as_deref().unwrap_or("unknown"),
            "Probe completed"
        );

        Ok(ProbeOutput {
            duration,
            width,
            height,
            codec,
            frame_rate,
            bitrate,
        })
    }
}

struct ProbeOutput {
    duration: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
    codec: Option<String>,
    frame_rate: Option<f32>,
    bitrate: Option<u64>,
}

async fn inspect_image(path: &Path) -> Result<(u32, u32, String)> {
    let data = tokio::fs::read(path).await?;

    // Decoding is CPU-bound; keep it off the async executor threads
    tokio::task::spawn_blocking(move || {
        let reader =
            image::ImageReader::new(std::io::Cursor::new(&data)).with_guessed_format()?;
        let format = reader
            .format()
            .map(|f| format!("{:?}", f))
            .unwrap_or_else(|| "unknown".to_string());
        let img = reader.decode()?;
        Ok((img.width(), img.height(), format))
    })
    .await
    .context("Image decode task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[tokio::test]
    async fn test_inspect_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pano.png");
        let data = png_bytes(640, 320);
        tokio::fs::write(&path, &data).await.unwrap();

        let inspector = MediaInspector::new("ffprobe".to_string()).unwrap();
        let info = inspector
            .inspect(&path, MediaKind::Image, data.len() as u64)
            .await;

        match info {
            MediaInfo::Image(image) => {
                assert_eq!(image.width, Some(640));
                assert_eq!(image.height, Some(320));
                assert_eq!(image.format.as_deref(), Some("Png"));
                assert_eq!(image.size_bytes, data.len() as u64);
            }
            other => panic!("expected image info, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inspect_corrupt_image_degrades() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        tokio::fs::write(&path, b"not an image at all").await.unwrap();

        let inspector = MediaInspector::new("ffprobe".to_string()).unwrap();
        let info = inspector.inspect(&path, MediaKind::Image, 19).await;

        match info {
            MediaInfo::Image(image) => {
                assert_eq!(image.width, None);
                assert_eq!(image.height, None);
                assert_eq!(image.size_bytes, 19);
            }
            other => panic!("expected image info, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inspect_other_is_size_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scene.bundle");
        tokio::fs::write(&path, b"opaque").await.unwrap();

        let inspector = MediaInspector::new("ffprobe".to_string()).unwrap();
        let info = inspector.inspect(&path, MediaKind::Other, 6).await;

        match info {
            MediaInfo::Other(other) => assert_eq!(other.size_bytes, 6),
            unexpected => panic!("expected other info, got {:?}", unexpected),
        }
    }

    #[test]
    fn test_rejects_dangerous_ffprobe_path() {
        assert!(MediaInspector::new("ffprobe; rm -rf /".to_string()).is_err());
        assert!(MediaInspector::new("../ffprobe".to_string()).is_err());
        assert!(MediaInspector::new("/usr/bin/ffprobe".to_string()).is_ok());
    }
}
