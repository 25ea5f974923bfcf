//! # Audio Format Normalizer
//!
//! Decides whether an uploaded audio file can go to the dialog service
//! as-is, and re-encodes it when it cannot.
//!
//! ## Flow:
//! 1. Inspect the file's WAV header (`wav::inspect`)
//! 2. Already at target → hand the file back untouched, zero transcoder runs
//! 3. Otherwise → exactly one transcoder run asking for the target format,
//!    into a fresh scratch file registered with the request's [`ScratchSet`]
//! 4. Re-inspect the transcoder's output; anything but an exact match is a
//!    [`AppError::FormatConversion`] failure
//!
//! An input with no readable header that the transcoder rejects too is
//! reported as [`AppError::UnrecognizedFormat`]: the upload was not audio.
//!
//! The normalizer never deletes anything itself; the caller's `ScratchSet`
//! owns removal of both the original upload and the conversion output.

use super::scratch::{ScratchDir, ScratchSet};
use super::transcode::Transcoder;
use super::wav::{self, FormatCheck};
use super::TargetFormat;
use crate::error::{AppError, AppResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Ensure the audio at `input` matches `target`, transcoding when needed.
///
/// Returns the path of the conforming file: `input` itself when it already
/// matched, or the tracked conversion output otherwise.
pub async fn ensure_target<T>(
    input: &Path,
    target: TargetFormat,
    transcoder: &T,
    scratch: &ScratchDir,
    tracker: &mut ScratchSet,
) -> AppResult<PathBuf>
where
    T: Transcoder + ?Sized,
{
    let bytes = fs::read(input).await?;
    let check = wav::inspect(&bytes);

    if check.matches(target) {
        debug!(path = %input.display(), "audio already at target format");
        return Ok(input.to_path_buf());
    }

    match check {
        FormatCheck::Recognized {
            sample_rate_hz,
            channels,
        } => info!(
            path = %input.display(),
            rate = sample_rate_hz,
            channels = channels,
            "audio off target, converting"
        ),
        FormatCheck::Unrecognized => info!(
            path = %input.display(),
            "no readable WAV header, converting"
        ),
    }

    let output = tracker.track(scratch.allocate("converted", "wav"));
    if let Err(err) = transcoder.transcode(input, &output, target).await {
        // A payload with no readable header that the transcoder also
        // rejects is not audio at all.
        if check == FormatCheck::Unrecognized {
            return Err(AppError::UnrecognizedFormat(format!(
                "input {} has no readable WAV header and could not be converted",
                input.display()
            )));
        }
        return Err(err);
    }

    let converted = fs::read(&output).await?;
    if !wav::inspect(&converted).matches(target) {
        return Err(AppError::FormatConversion(format!(
            "transcoded file {} still does not read as {} Hz / {} channel(s)",
            output.display(),
            target.sample_rate_hz,
            target.channels
        )));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testutil::wav_bytes;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Transcoder double that records each invocation and writes a canned
    /// header to the output path.
    struct FakeTranscoder {
        calls: Mutex<Vec<TargetFormat>>,
        output: Option<Vec<u8>>,
        fail: bool,
    }

    impl FakeTranscoder {
        fn writing(output: Vec<u8>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                output: Some(output),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                output: None,
                fail: true,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(
            &self,
            _input: &Path,
            output: &Path,
            target: TargetFormat,
        ) -> AppResult<()> {
            self.calls.lock().unwrap().push(target);
            if self.fail {
                return Err(AppError::ExternalService("transcoder crashed".into()));
            }
            if let Some(bytes) = &self.output {
                std::fs::write(output, bytes).unwrap();
            }
            Ok(())
        }
    }

    async fn setup(input_bytes: &[u8]) -> (tempfile::TempDir, ScratchDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(dir.path()).unwrap();
        let input = scratch.allocate("upload", "wav");
        fs::write(&input, input_bytes).await.unwrap();
        (dir, scratch, input)
    }

    #[tokio::test]
    async fn test_already_at_target_is_untouched() {
        let (_dir, scratch, input) = setup(&wav_bytes(16000, 1)).await;
        let transcoder = FakeTranscoder::writing(wav_bytes(16000, 1));
        let mut tracker = ScratchSet::new();

        let result = ensure_target(&input, TargetFormat::default(), &transcoder, &scratch, &mut tracker)
            .await
            .unwrap();

        assert_eq!(result, input);
        assert_eq!(transcoder.call_count(), 0);
        assert_eq!(tracker.created(), 0);
    }

    #[tokio::test]
    async fn test_off_target_transcodes_exactly_once() {
        let (_dir, scratch, input) = setup(&wav_bytes(44100, 2)).await;
        let transcoder = FakeTranscoder::writing(wav_bytes(16000, 1));
        let mut tracker = ScratchSet::new();

        let result = ensure_target(&input, TargetFormat::default(), &transcoder, &scratch, &mut tracker)
            .await
            .unwrap();

        assert_ne!(result, input);
        assert_eq!(transcoder.call_count(), 1);
        assert_eq!(
            transcoder.calls.lock().unwrap()[0],
            TargetFormat::new(16000, 1)
        );
        assert_eq!(tracker.created(), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_input_is_converted() {
        let (_dir, scratch, input) = setup(b"not audio at all").await;
        let transcoder = FakeTranscoder::writing(wav_bytes(16000, 1));
        let mut tracker = ScratchSet::new();

        let result = ensure_target(&input, TargetFormat::default(), &transcoder, &scratch, &mut tracker)
            .await
            .unwrap();

        assert_eq!(transcoder.call_count(), 1);
        assert!(result.exists());
    }

    #[tokio::test]
    async fn test_residual_mismatch_is_conversion_error() {
        // The transcoder claims success but its output still reads stereo.
        let (_dir, scratch, input) = setup(&wav_bytes(44100, 2)).await;
        let transcoder = FakeTranscoder::writing(wav_bytes(16000, 2));
        let mut tracker = ScratchSet::new();

        let err = ensure_target(&input, TargetFormat::default(), &transcoder, &scratch, &mut tracker)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::FormatConversion(_)));
        // The failed output is still tracked, so cleanup removes it.
        assert_eq!(tracker.created(), 1);
    }

    #[tokio::test]
    async fn test_transcoder_failure_propagates() {
        let (_dir, scratch, input) = setup(&wav_bytes(44100, 2)).await;
        let transcoder = FakeTranscoder::failing();
        let mut tracker = ScratchSet::new();

        let err = ensure_target(&input, TargetFormat::default(), &transcoder, &scratch, &mut tracker)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ExternalService(_)));
    }

    #[tokio::test]
    async fn test_unconvertible_non_audio_is_unrecognized() {
        // No readable header going in, and the transcoder cannot make sense
        // of it either: the upload was never audio.
        let (_dir, scratch, input) = setup(b"<html>not audio</html>").await;
        let transcoder = FakeTranscoder::failing();
        let mut tracker = ScratchSet::new();

        let err = ensure_target(&input, TargetFormat::default(), &transcoder, &scratch, &mut tracker)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UnrecognizedFormat(_)));
    }
}
