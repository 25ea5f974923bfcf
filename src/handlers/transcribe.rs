//! # Transcription Endpoint
//!
//! `POST /api/v1/transcribe` proxies an uploaded recording to the
//! asynchronous transcription service: normalize, submit a job, poll until
//! the job reaches a terminal state (bounded by the configured attempt cap
//! and deadline, cancelled by server shutdown), then fetch and return the
//! transcript text.

use crate::audio::normalizer;
use crate::audio::scratch::ScratchSet;
use crate::error::AppError;
use crate::handlers::upload::parse_upload;
use crate::state::AppState;
use crate::transcription::poll_until_complete;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

pub async fn transcribe_audio(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let config = state.get_config();
    let form = parse_upload(payload, config.audio.max_upload_bytes).await?;

    let mut tracker = ScratchSet::new();

    let upload_path = tracker.track(state.scratch().allocate("audio", &form.extension()));
    tokio::fs::write(&upload_path, &form.audio).await?;

    // The transcription service accepts the same raw format as the dialog
    // service, so reuse the normalizer before submitting.
    let normalized_path = normalizer::ensure_target(
        &upload_path,
        state.target_format(),
        state.transcoder(),
        state.scratch(),
        &mut tracker,
    )
    .await?;
    let normalized_audio = tokio::fs::read(&normalized_path).await?;

    let client = state.transcription_client();
    let job_name = client
        .submit_job(normalized_audio, "wav", &config.transcription.language_code)
        .await?;

    let transcript_uri = poll_until_complete(state.poll_policy(), state.shutdown_signal(), || {
        let client = client.clone();
        let job_name = job_name.clone();
        async move { client.get_job(&job_name).await }
    })
    .await?;

    let transcript = client.fetch_transcript(&transcript_uri).await?;

    info!(job_name = %job_name, chars = transcript.len(), "transcription complete");

    Ok(HttpResponse::Ok().json(json!({
        "jobName": job_name,
        "languageCode": config.transcription.language_code,
        "transcript": transcript,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
