//! # Audio Transcoding
//!
//! Trait seam over the external transcoding tool, plus the production
//! implementation that shells out to `ffmpeg` for a one-shot conversion.
//! The normalizer only ever asks for exactly the target channel count and
//! sample rate; anything more elaborate belongs to the tool itself.

use super::TargetFormat;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// One-shot audio conversion: read `input`, write `output` at the target
/// channel count and sample rate.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path, target: TargetFormat) -> AppResult<()>;
}

/// Production transcoder backed by an `ffmpeg` subprocess.
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    /// `binary` is the ffmpeg executable; a bare "ffmpeg" resolves via PATH.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, target: TargetFormat) -> AppResult<()> {
        info!(
            input = %input.display(),
            output = %output.display(),
            rate = target.sample_rate_hz,
            channels = target.channels,
            "converting audio"
        );

        let result = Command::new(&self.binary)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-ac")
            .arg(target.channels.to_string())
            .arg("-ar")
            .arg(target.sample_rate_hz.to_string())
            .arg(output)
            .output()
            .await
            .map_err(|e| {
                AppError::ExternalService(format!(
                    "failed to launch transcoder '{}': {}",
                    self.binary, e
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AppError::ExternalService(format!(
                "transcoder exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        debug!(output = %output.display(), "conversion finished");
        Ok(())
    }
}
