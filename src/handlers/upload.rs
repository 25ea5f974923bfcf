//! Multipart upload draining shared by the audio endpoints.
//!
//! Collects the `audio` file part plus any simple text parts
//! (`sessionState`, `requestAttributes`, `sessionId`, ...) into an
//! [`UploadForm`], enforcing the configured size cap while the bytes
//! stream in rather than after buffering them all.

use crate::error::AppError;
use actix_multipart::{Field, Multipart};
use futures_util::stream::StreamExt;
use std::collections::HashMap;

/// Name of the file part carrying the audio payload.
const AUDIO_FIELD: &str = "audio";

/// A fully drained multipart upload.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub audio: Vec<u8>,
    pub filename: Option<String>,
    /// Non-file parts, keyed by field name.
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Text field by name, if the client sent it non-empty.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str()).filter(|s| !s.is_empty())
    }

    /// File extension of the uploaded audio, lowercased, defaulting to
    /// "wav" when the client gave no usable filename.
    pub fn extension(&self) -> String {
        audio_extension(self.filename.as_deref())
    }
}

pub(crate) fn audio_extension(filename: Option<&str>) -> String {
    filename
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "wav".to_string())
}

/// Drain a multipart payload into an [`UploadForm`].
///
/// Fails with `BadRequest` when the stream is malformed, the audio part is
/// missing or empty, or the audio exceeds `max_audio_bytes`.
pub async fn parse_upload(mut payload: Multipart, max_audio_bytes: usize) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    let mut saw_audio = false;

    while let Some(item) = payload.next().await {
        let mut field: Field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let Some(content_disposition) = field.content_disposition() else {
            return Err(AppError::BadRequest("Missing content disposition".to_string()));
        };

        let Some(name) = content_disposition.get_name().map(|s| s.to_string()) else {
            return Err(AppError::BadRequest("Missing field name".to_string()));
        };

        if name == AUDIO_FIELD {
            saw_audio = true;
            form.filename = content_disposition.get_filename().map(|s| s.to_string());

            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk =
                    chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
                if bytes.len() + chunk.len() > max_audio_bytes {
                    return Err(AppError::BadRequest(format!(
                        "Audio file too large (max: {} bytes)",
                        max_audio_bytes
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }
            form.audio = bytes;
        } else {
            let mut text = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk =
                    chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
                text.extend_from_slice(&chunk);
            }
            let value = String::from_utf8(text).map_err(|_| {
                AppError::BadRequest(format!("Field '{}' is not valid UTF-8", name))
            })?;
            form.fields.insert(name, value);
        }
    }

    if !saw_audio || form.audio.is_empty() {
        return Err(AppError::BadRequest("No audio file uploaded".to_string()));
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_extension() {
        assert_eq!(audio_extension(Some("clip.WAV")), "wav");
        assert_eq!(audio_extension(Some("voice.note.mp3")), "mp3");
        assert_eq!(audio_extension(Some("noextension")), "wav");
        assert_eq!(audio_extension(Some("trailingdot.")), "wav");
        assert_eq!(audio_extension(Some("weird.ex//t")), "wav");
        assert_eq!(audio_extension(None), "wav");
    }

    #[test]
    fn test_field_lookup_skips_empty_values() {
        let mut form = UploadForm::default();
        form.fields.insert("sessionId".to_string(), "abc".to_string());
        form.fields.insert("sessionState".to_string(), String::new());

        assert_eq!(form.field("sessionId"), Some("abc"));
        assert_eq!(form.field("sessionState"), None);
        assert_eq!(form.field("missing"), None);
    }
}
