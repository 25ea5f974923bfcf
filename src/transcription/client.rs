//! HTTP client for the transcription job API.
//!
//! Jobs are submitted as multipart uploads and tracked by name; a finished
//! job points at a result document whose transcript text this client
//! extracts.

use super::JobStatus;
use crate::config::TranscriptionConfig;
use crate::error::{AppError, AppResult};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReply {
    job_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReply {
    status: String,
    #[serde(default)]
    transcript_uri: Option<String>,
    #[serde(default)]
    failure_reason: Option<String>,
}

/// Result document layout: the transcript text lives in
/// `results.transcripts[0].transcript`.
#[derive(Debug, Deserialize)]
struct TranscriptDocument {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    transcripts: Vec<TranscriptEntry>,
}

#[derive(Debug, Deserialize)]
struct TranscriptEntry {
    transcript: String,
}

/// Client for the asynchronous transcription service.
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl TranscriptionClient {
    /// `http` is the process-wide connection pool shared across clients.
    pub fn new(http: Client, config: &TranscriptionConfig, api_key: Option<String>) -> Self {
        Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn api_key(&self) -> AppResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::ConfigError("TRANSCRIPTION_API_KEY is not set".to_string()))
    }

    /// Submit a transcription job; returns the service-assigned job name.
    pub async fn submit_job(
        &self,
        audio: Vec<u8>,
        media_format: &str,
        language_code: &str,
    ) -> AppResult<String> {
        let part = Part::bytes(audio)
            .file_name(format!("audio.{}", media_format))
            .mime_str("application/octet-stream")
            .map_err(|e| AppError::Internal(format!("invalid media part: {}", e)))?;

        let form = Form::new()
            .text("languageCode", language_code.to_string())
            .text("mediaFormat", media_format.to_string())
            .part("media", part);

        let response = self
            .http
            .post(format!("{}/jobs", self.endpoint))
            .bearer_auth(self.api_key()?)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::service_error("submit", response).await);
        }

        let reply = response.json::<SubmitReply>().await.map_err(|e| {
            AppError::ExternalService(format!("malformed job submission reply: {}", e))
        })?;

        info!(job_name = %reply.job_name, "transcription job submitted");
        Ok(reply.job_name)
    }

    /// Fetch the current status of a submitted job.
    pub async fn get_job(&self, job_name: &str) -> AppResult<JobStatus> {
        let response = self
            .http
            .get(format!("{}/jobs/{}", self.endpoint, job_name))
            .bearer_auth(self.api_key()?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::service_error("status", response).await);
        }

        let reply = response
            .json::<JobReply>()
            .await
            .map_err(|e| AppError::ExternalService(format!("malformed job status reply: {}", e)))?;

        debug!(job_name, status = %reply.status, "transcription job status");
        Ok(Self::job_status(reply))
    }

    fn job_status(reply: JobReply) -> JobStatus {
        match reply.status.as_str() {
            "COMPLETED" => match reply.transcript_uri {
                Some(transcript_uri) => JobStatus::Completed { transcript_uri },
                None => JobStatus::Failed {
                    reason: "job completed without a transcript URI".to_string(),
                },
            },
            "FAILED" => JobStatus::Failed {
                reason: reply
                    .failure_reason
                    .unwrap_or_else(|| "no failure reason reported".to_string()),
            },
            // QUEUED / IN_PROGRESS and anything the service adds later.
            _ => JobStatus::InProgress,
        }
    }

    /// Download a finished job's result document and pull out the
    /// transcript text.
    pub async fn fetch_transcript(&self, transcript_uri: &str) -> AppResult<String> {
        let response = self
            .http
            .get(transcript_uri)
            .bearer_auth(self.api_key()?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::service_error("transcript", response).await);
        }

        let document = response.json::<TranscriptDocument>().await.map_err(|e| {
            AppError::ExternalService(format!("malformed transcript document: {}", e))
        })?;

        document
            .results
            .transcripts
            .into_iter()
            .next()
            .map(|entry| entry.transcript)
            .ok_or_else(|| {
                AppError::ExternalService("transcript document contains no transcript".to_string())
            })
    }

    async fn service_error(operation: &str, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(operation, status = %status, body = %body, "transcription service rejected request");
        AppError::ExternalService(format!(
            "transcription {} call failed with status {}",
            operation, status
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_mapping() {
        let completed = JobReply {
            status: "COMPLETED".to_string(),
            transcript_uri: Some("https://results.example.test/doc.json".to_string()),
            failure_reason: None,
        };
        assert_eq!(
            TranscriptionClient::job_status(completed),
            JobStatus::Completed {
                transcript_uri: "https://results.example.test/doc.json".to_string()
            }
        );

        let failed = JobReply {
            status: "FAILED".to_string(),
            transcript_uri: None,
            failure_reason: Some("unsupported codec".to_string()),
        };
        assert_eq!(
            TranscriptionClient::job_status(failed),
            JobStatus::Failed {
                reason: "unsupported codec".to_string()
            }
        );

        for pending in ["QUEUED", "IN_PROGRESS", "SOMETHING_NEW"] {
            let reply = JobReply {
                status: pending.to_string(),
                transcript_uri: None,
                failure_reason: None,
            };
            assert_eq!(TranscriptionClient::job_status(reply), JobStatus::InProgress);
        }
    }

    #[test]
    fn test_completed_without_uri_is_failure() {
        let reply = JobReply {
            status: "COMPLETED".to_string(),
            transcript_uri: None,
            failure_reason: None,
        };
        assert!(matches!(
            TranscriptionClient::job_status(reply),
            JobStatus::Failed { .. }
        ));
    }

    #[test]
    fn test_transcript_document_parsing() {
        let json = r#"{"results": {"transcripts": [{"transcript": "hello world"}]}}"#;
        let document: TranscriptDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.results.transcripts[0].transcript, "hello world");
    }
}
