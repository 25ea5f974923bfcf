//! HTTP client for the dialog runtime API.
//!
//! Bot, alias, locale, and session identifiers are path segments;
//! credentials ride as a bearer token. The audio call puts its envelopes in
//! `x-dialog-*` headers and streams audio in both request and response
//! bodies; the text call is JSON in, JSON out.

use crate::config::DialogConfig;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

/// Request header carrying the encoded session-state envelope.
pub const SESSION_STATE_HEADER: &str = "x-dialog-session-state";
/// Request header carrying the encoded request-attributes envelope.
pub const REQUEST_ATTRIBUTES_HEADER: &str = "x-dialog-request-attributes";
/// Response header with the recognized transcript envelope.
pub const INPUT_TRANSCRIPT_HEADER: &str = "x-dialog-input-transcript";
/// Response header with the interpretations envelope.
pub const INTERPRETATIONS_HEADER: &str = "x-dialog-interpretations";
/// Response header with the bot messages envelope.
pub const MESSAGES_HEADER: &str = "x-dialog-messages";
/// Header naming the service region.
pub const REGION_HEADER: &str = "x-dialog-region";

/// Reply to an audio utterance call. All structured fields are still
/// envelope strings exactly as the service returned them; the caller
/// decodes them.
#[derive(Debug, Default)]
pub struct UtteranceReply {
    pub input_transcript: Option<String>,
    pub interpretations: Option<String>,
    pub messages: Option<String>,
    pub session_state: Option<String>,
    pub request_attributes: Option<String>,
    /// Synthesized response audio (MIME type per configuration).
    pub audio: Vec<u8>,
}

/// Reply to a text call; the text path exchanges plain JSON.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextReply {
    #[serde(default)]
    pub interpretations: Option<Value>,
    #[serde(default)]
    pub messages: Option<Value>,
    #[serde(default)]
    pub session_state: Option<Value>,
    #[serde(default)]
    pub request_attributes: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_state: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_attributes: Option<&'a Value>,
}

/// Client for one configured bot on the dialog runtime.
#[derive(Debug, Clone)]
pub struct DialogClient {
    http: Client,
    endpoint: String,
    region: String,
    bot_id: String,
    bot_alias_id: String,
    locale_id: String,
    response_audio_type: String,
    api_key: Option<String>,
}

impl DialogClient {
    /// `http` is the process-wide connection pool; cloning it is cheap and
    /// shares the underlying connections.
    pub fn new(http: Client, config: &DialogConfig, api_key: Option<String>) -> Self {
        Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            region: config.region.clone(),
            bot_id: config.bot_id.clone(),
            bot_alias_id: config.bot_alias_id.clone(),
            locale_id: config.locale_id.clone(),
            response_audio_type: config.response_audio_type.clone(),
            api_key,
        }
    }

    fn session_url(&self, session_id: &str, operation: &str) -> String {
        format!(
            "{}/bots/{}/aliases/{}/locales/{}/sessions/{}/{}",
            self.endpoint, self.bot_id, self.bot_alias_id, self.locale_id, session_id, operation
        )
    }

    fn api_key(&self) -> AppResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::ConfigError("DIALOG_API_KEY is not set".to_string()))
    }

    /// Send one audio utterance and collect the interpreted reply.
    ///
    /// `content_type` describes the (already normalized) input audio;
    /// `session_state` and `request_attributes` must already be envelope
    /// strings. The reply's structured fields come back as envelope strings
    /// in response headers, untouched by this method.
    pub async fn recognize_utterance(
        &self,
        session_id: &str,
        audio: Vec<u8>,
        content_type: &str,
        session_state: &str,
        request_attributes: &str,
    ) -> AppResult<UtteranceReply> {
        let url = self.session_url(session_id, "utterance");
        debug!(url = %url, bytes = audio.len(), "sending utterance to dialog service");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key()?)
            .header(REGION_HEADER, &self.region)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::ACCEPT, &self.response_audio_type)
            .header(SESSION_STATE_HEADER, session_state)
            .header(REQUEST_ATTRIBUTES_HEADER, request_attributes)
            .body(audio)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::service_error("utterance", response).await);
        }

        let reply = UtteranceReply {
            input_transcript: header_value(response.headers(), INPUT_TRANSCRIPT_HEADER),
            interpretations: header_value(response.headers(), INTERPRETATIONS_HEADER),
            messages: header_value(response.headers(), MESSAGES_HEADER),
            session_state: header_value(response.headers(), SESSION_STATE_HEADER),
            request_attributes: header_value(response.headers(), REQUEST_ATTRIBUTES_HEADER),
            audio: Vec::new(),
        };

        let audio = response.bytes().await?;
        Ok(UtteranceReply {
            audio: audio.to_vec(),
            ..reply
        })
    }

    /// Send typed text for the given session and collect the interpreted
    /// reply. Structured fields travel as plain JSON on this path.
    pub async fn recognize_text(
        &self,
        session_id: &str,
        text: &str,
        session_state: Option<&Value>,
        request_attributes: Option<&Value>,
    ) -> AppResult<TextReply> {
        let url = self.session_url(session_id, "text");
        debug!(url = %url, "sending text to dialog service");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key()?)
            .header(REGION_HEADER, &self.region)
            .json(&TextRequest {
                text,
                session_state,
                request_attributes,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::service_error("text", response).await);
        }

        let reply = response.json::<TextReply>().await.map_err(|e| {
            AppError::ExternalService(format!("malformed dialog text reply: {}", e))
        })?;
        Ok(reply)
    }
}

/// Copy a response header out as an owned string; absent or non-UTF-8
/// headers read as absent fields.
fn header_value(headers: &reqwest::header::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

impl DialogClient {
    async fn service_error(operation: &str, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(operation, status = %status, body = %body, "dialog service rejected request");
        AppError::ExternalService(format!(
            "dialog {} call failed with status {}",
            operation, status
        ))
    }
}
