//! # Audio Processing Module
//!
//! This module owns the audio half of the request pipeline: deciding whether
//! an uploaded file is already in the format the dialog service accepts, and
//! re-encoding it through an external transcoder when it is not.
//!
//! ## Key Components:
//! - **WAV Inspection** (`wav`): bounds-checked header reads at the fixed
//!   RIFF offsets, yielding a tagged recognized/unrecognized result
//! - **Transcoder** (`transcode`): trait seam over a one-shot ffmpeg run
//! - **Normalizer** (`normalizer`): inspect → transcode → re-inspect flow
//! - **Scratch Storage** (`scratch`): per-request temporary files with
//!   guaranteed exactly-once removal
//!
//! ## Target Format:
//! The dialog service accepts raw audio only at 16kHz, mono. Everything
//! else gets one transcoding pass and a re-check; a file that still reads
//! off-target afterwards is a hard failure, not a retry.

pub mod normalizer;
pub mod scratch;
pub mod transcode;
pub mod wav;

/// The audio format required by the dialog service for utterance input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormat {
    pub sample_rate_hz: u32,
    pub channels: u16,
}

impl TargetFormat {
    pub fn new(sample_rate_hz: u32, channels: u16) -> Self {
        Self {
            sample_rate_hz,
            channels,
        }
    }

    pub fn from_config(config: &crate::config::AudioConfig) -> Self {
        Self {
            sample_rate_hz: config.target_sample_rate,
            channels: config.target_channels,
        }
    }
}

impl Default for TargetFormat {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16000,
            channels: 1,
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    /// Build a minimal canonical WAV header (44 bytes, empty data chunk)
    /// carrying the given format fields at the standard offsets.
    pub fn wav_bytes(sample_rate_hz: u32, channels: u16) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(44);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&36u32.to_le_bytes()); // chunk size for empty data
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&channels.to_le_bytes()); // offset 22
        bytes.extend_from_slice(&sample_rate_hz.to_le_bytes()); // offset 24
        let byte_rate = sample_rate_hz * u32::from(channels) * 2;
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        let block_align = channels * 2;
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes
    }
}
