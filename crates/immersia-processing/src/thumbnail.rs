//! Thumbnail generator.
//!
//! Produces a square JPEG still for image and video assets. Thumbnail
//! absence is never fatal: every failure path logs and returns `None`.

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use immersia_core::models::MediaKind;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

pub struct ThumbnailGenerator {
    ffmpeg_path: String,
    /// Square edge length of the output, in pixels.
    target_size: u32,
    jpeg_quality: u8,
    /// Relative offset into a video's duration where the frame is taken.
    frame_offset_percent: f64,
}

impl ThumbnailGenerator {
    pub fn new(
        ffmpeg_path: String,
        target_size: u32,
        jpeg_quality: u8,
        frame_offset_percent: f64,
    ) -> Self {
        Self {
            ffmpeg_path,
            target_size,
            jpeg_quality,
            frame_offset_percent,
        }
    }

    /// Generate a thumbnail for the given asset, writing it to `output_path`.
    ///
    /// Images are cropped/resized to the square target and re-encoded at the
    /// configured JPEG quality. Videos get a single frame extracted at the
    /// configured relative offset, then the same resize. Audio and other
    /// kinds have no thumbnail. Returns `false` when no thumbnail was
    /// produced.
    #[tracing::instrument(skip(self, source, output_path), fields(kind = kind.as_str()))]
    pub async fn generate(
        &self,
        source: &Path,
        kind: MediaKind,
        duration: Option<f64>,
        output_path: &Path,
    ) -> bool {
        let result = match kind {
            MediaKind::Image => self.from_image(source, output_path).await,
            MediaKind::Video => self.from_video(source, duration, output_path).await,
            MediaKind::Audio | MediaKind::Other => return false,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    source = %source.display(),
                    error = %e,
                    "Thumbnail generation failed; asset will have no thumbnail"
                );
                false
            }
        }
    }

    async fn from_image(&self, source: &Path, output_path: &Path) -> Result<()> {
        let data = tokio::fs::read(source).await?;
        let target_size = self.target_size;
        let jpeg_quality = self.jpeg_quality;

        // Decode/resize/encode are CPU-bound; keep them off the executor threads
        let encoded = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let img = image::ImageReader::new(std::io::Cursor::new(&data))
                .with_guessed_format()?
                .decode()?;

            let thumb = img.resize_to_fill(target_size, target_size, FilterType::Lanczos3);

            let mut buffer = Vec::new();
            let mut cursor = std::io::Cursor::new(&mut buffer);
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                &mut cursor,
                jpeg_quality,
            );
            thumb.to_rgb8().write_with_encoder(encoder)?;
            Ok(buffer)
        })
        .await
        .context("Thumbnail encode task panicked")??;

        tokio::fs::write(output_path, encoded).await?;
        Ok(())
    }

    async fn from_video(
        &self,
        source: &Path,
        duration: Option<f64>,
        output_path: &Path,
    ) -> Result<()> {
        let timestamp = duration
            .map(|d| d * self.frame_offset_percent / 100.0)
            .unwrap_or(0.0);

        let frame_path = output_path.with_extension("frame.png");

        let output = Command::new(&self.ffmpeg_path)
            .args([
                "-y",
                "-ss",
                &format!("{:.3}", timestamp),
                "-i",
                &source.to_string_lossy(),
                "-frames:v",
                "1",
                "-f",
                "image2",
            ])
            .arg(&frame_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("FFmpeg frame extraction failed: {}", stderr));
        }

        let result = self.from_image(&frame_path, output_path).await;

        if let Err(e) = tokio::fs::remove_file(&frame_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %frame_path.display(),
                    error = %e,
                    "Failed to remove extracted frame"
                );
            }
        }

        result
    }
}
