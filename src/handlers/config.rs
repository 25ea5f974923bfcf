use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

fn config_body(config: &crate::config::AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "dialog": {
            "endpoint": config.dialog.endpoint,
            "region": config.dialog.region,
            "bot_id": config.dialog.bot_id,
            "bot_alias_id": config.dialog.bot_alias_id,
            "locale_id": config.dialog.locale_id,
            "response_audio_type": config.dialog.response_audio_type
        },
        "transcription": {
            "endpoint": config.transcription.endpoint,
            "language_code": config.transcription.language_code,
            "poll_interval_ms": config.transcription.poll_interval_ms,
            "max_poll_attempts": config.transcription.max_poll_attempts,
            "job_timeout_secs": config.transcription.job_timeout_secs
        },
        "audio": {
            "target_sample_rate": config.audio.target_sample_rate,
            "target_channels": config.audio.target_channels,
            "max_upload_bytes": config.audio.max_upload_bytes,
            "ffmpeg_path": config.audio.ffmpeg_path
        },
        "storage": {
            "scratch_dir": config.storage.scratch_dir
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_body(&config)
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config.update_from_json(&json_str).map_err(|e| {
        AppError::ValidationError(e.to_string())
    })?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": config_body(&current_config)
    })))
}
