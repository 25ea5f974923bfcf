//! # Audio Conversation Endpoint
//!
//! `POST /api/v1/converse/audio` runs the full pipeline for one spoken turn:
//!
//! 1. Drain the multipart upload (audio part + optional JSON text parts)
//! 2. Park the audio in the scratch directory
//! 3. Normalize it to the dialog service's target format
//! 4. Wrap session state and request attributes in compressed envelopes
//! 5. One utterance call to the dialog service
//! 6. Unwrap the envelopes that came back, base64 the response audio
//!
//! Steps run strictly in order; each one's output is the next one's input.
//! Every scratch file is registered with a [`ScratchSet`] the moment it is
//! created, so the guard removes them on success and on every early return.

use crate::audio::normalizer;
use crate::audio::scratch::ScratchSet;
use crate::envelope;
use crate::error::AppError;
use crate::handlers::upload::{parse_upload, UploadForm};
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Parse an optional JSON text part, falling back to `default` when the
/// client sent nothing.
fn structured_field(
    form: &UploadForm,
    name: &str,
    default: fn() -> Value,
) -> Result<Value, AppError> {
    match form.field(name) {
        Some(text) => serde_json::from_str(text)
            .map_err(|e| AppError::BadRequest(format!("Field '{}' is not valid JSON: {}", name, e))),
        None => Ok(default()),
    }
}

/// Decode an envelope returned by the dialog service; absent fields decode
/// to JSON null.
fn decoded_field(envelope_text: Option<&String>) -> Result<Value, AppError> {
    match envelope_text {
        Some(text) => envelope::decode(text),
        None => Ok(Value::Null),
    }
}

pub async fn converse_audio(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let config = state.get_config();
    let form = parse_upload(payload, config.audio.max_upload_bytes).await?;

    // Session id comes from the client when it wants continuity; otherwise
    // each upload starts a fresh session.
    let session_id = form
        .field("sessionId")
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let session_state = structured_field(&form, "sessionState", envelope::default_session_state)?;
    let request_attributes =
        structured_field(&form, "requestAttributes", envelope::default_request_attributes)?;

    let mut tracker = ScratchSet::new();

    let upload_path = tracker.track(state.scratch().allocate("audio", &form.extension()));
    tokio::fs::write(&upload_path, &form.audio).await?;

    let normalized_path = normalizer::ensure_target(
        &upload_path,
        state.target_format(),
        state.transcoder(),
        state.scratch(),
        &mut tracker,
    )
    .await?;
    let normalized_audio = tokio::fs::read(&normalized_path).await?;

    let encoded_session_state = envelope::encode(&session_state)?;
    let encoded_request_attributes = envelope::encode(&request_attributes)?;

    let reply = state
        .dialog_client()
        .recognize_utterance(
            &session_id,
            normalized_audio,
            &config.audio.request_content_type(),
            &encoded_session_state,
            &encoded_request_attributes,
        )
        .await?;

    info!(
        session_id = %session_id,
        response_audio_bytes = reply.audio.len(),
        "dialog utterance round trip complete"
    );

    let body = json!({
        "sessionId": session_id,
        "audio": BASE64.encode(&reply.audio),
        "inputTranscript": decoded_field(reply.input_transcript.as_ref())?,
        "interpretations": decoded_field(reply.interpretations.as_ref())?,
        "messages": decoded_field(reply.messages.as_ref())?,
        "sessionState": decoded_field(reply.session_state.as_ref())?,
        "requestAttributes": decoded_field(reply.request_attributes.as_ref())?,
    });

    // tracker drops here, removing the upload and any conversion output.
    Ok(HttpResponse::Ok().json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_field_default_and_override() {
        let mut form = UploadForm::default();
        assert_eq!(
            structured_field(&form, "sessionState", envelope::default_session_state).unwrap(),
            json!({"dialogAction": {"type": "ElicitIntent"}})
        );

        form.fields.insert(
            "sessionState".to_string(),
            r#"{"dialogAction":{"type":"Delegate"}}"#.to_string(),
        );
        assert_eq!(
            structured_field(&form, "sessionState", envelope::default_session_state).unwrap(),
            json!({"dialogAction": {"type": "Delegate"}})
        );
    }

    #[test]
    fn test_structured_field_rejects_malformed_json() {
        let mut form = UploadForm::default();
        form.fields.insert("requestAttributes".to_string(), "{not json".to_string());
        let err = structured_field(&form, "requestAttributes", envelope::default_request_attributes)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_decoded_field_absent_is_null() {
        assert_eq!(decoded_field(None).unwrap(), Value::Null);

        let envelope_text = envelope::encode(&json!({"intent": "OrderPizza"})).unwrap();
        assert_eq!(
            decoded_field(Some(&envelope_text)).unwrap(),
            json!({"intent": "OrderPizza"})
        );
    }

    #[test]
    fn test_decoded_field_rejects_garbage() {
        let garbage = "!!definitely not an envelope!!".to_string();
        assert!(matches!(
            decoded_field(Some(&garbage)),
            Err(AppError::Decode(_))
        ));
    }
}
