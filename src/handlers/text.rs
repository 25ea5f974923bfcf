//! # Text Conversation Endpoint
//!
//! `POST /api/v1/converse/text` is the typed-input variant. No audio, no
//! scratch files; structured fields travel as plain JSON on this path, so
//! the envelope codec is not involved.

use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextConverseRequest {
    pub text: String,
    pub session_id: String,
    #[serde(default)]
    pub session_state: Option<Value>,
    #[serde(default)]
    pub request_attributes: Option<Value>,
}

pub async fn converse_text(
    state: web::Data<AppState>,
    body: web::Json<TextConverseRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();

    if request.text.trim().is_empty() {
        return Err(AppError::ValidationError("Field 'text' must not be empty".to_string()));
    }
    if request.session_id.trim().is_empty() {
        return Err(AppError::ValidationError("Field 'sessionId' must not be empty".to_string()));
    }

    let reply = state
        .dialog_client()
        .recognize_text(
            &request.session_id,
            &request.text,
            request.session_state.as_ref(),
            request.request_attributes.as_ref(),
        )
        .await?;

    info!(session_id = %request.session_id, "dialog text round trip complete");

    Ok(HttpResponse::Ok().json(json!({
        "sessionId": request.session_id,
        "inputTranscript": request.text,
        "interpretations": reply.interpretations.unwrap_or(Value::Null),
        "messages": reply.messages.unwrap_or(Value::Null),
        "sessionState": reply.session_state.unwrap_or(Value::Null),
        "requestAttributes": reply.request_attributes.unwrap_or(Value::Null),
    })))
}
