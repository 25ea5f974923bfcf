//! # Configuration Management
//!
//! This module handles loading and managing application configuration from
//! multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_DIALOG_BOTID, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! API credentials are deliberately not part of [`AppConfig`]: they are read
//! from the environment once at startup (see [`Credentials`]) and never
//! serialized back out through the runtime config endpoints.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub dialog: DialogConfig,
    pub transcription: TranscriptionConfig,
    pub audio: AudioConfig,
    pub storage: StorageConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to (e.g., "127.0.0.1", "0.0.0.0")
/// - `port`: TCP port number to listen on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Dialog-service collaborator settings.
///
/// ## Fields:
/// - `endpoint`: Base URL of the dialog runtime API
/// - `region`: Service region identifier, forwarded with each request
/// - `bot_id` / `bot_alias_id`: Which configured bot to converse with
/// - `locale_id`: BCP-47-style locale the bot is configured for (e.g., "en_US")
/// - `response_audio_type`: MIME type requested for the bot's spoken reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogConfig {
    pub endpoint: String,
    pub region: String,
    pub bot_id: String,
    pub bot_alias_id: String,
    pub locale_id: String,
    pub response_audio_type: String,
}

/// Transcription-service collaborator settings, including the poll policy
/// that bounds how long a submitted job is watched.
///
/// ## Fields:
/// - `endpoint`: Base URL of the transcription job API
/// - `language_code`: Language hint submitted with each job (e.g., "en-US")
/// - `poll_interval_ms`: Delay between consecutive job-status checks
/// - `max_poll_attempts`: Hard cap on status checks per job
/// - `job_timeout_secs`: Overall deadline for a job, whichever bound
///   trips first ends the wait
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub endpoint: String,
    pub language_code: String,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub job_timeout_secs: u64,
}

/// Audio pipeline settings.
///
/// ## Fields:
/// - `target_sample_rate`: Sample rate the dialog service requires (Hz)
/// - `target_channels`: Channel count the dialog service requires
/// - `max_upload_bytes`: Upload size cap enforced before any processing
/// - `ffmpeg_path`: Transcoder binary, resolved via PATH when left as "ffmpeg"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub target_sample_rate: u32,
    pub target_channels: u16,
    pub max_upload_bytes: usize,
    pub ffmpeg_path: String,
}

impl AudioConfig {
    /// MIME type describing raw audio at the target format, sent as the
    /// request content type on the dialog utterance call.
    pub fn request_content_type(&self) -> String {
        format!(
            "audio/l16; rate={}; channels={}",
            self.target_sample_rate, self.target_channels
        )
    }
}

/// Scratch storage settings for uploaded and transcoded audio files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub scratch_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            dialog: DialogConfig {
                endpoint: String::new(),
                region: "us-west-2".to_string(),
                bot_id: String::new(),
                bot_alias_id: String::new(),
                locale_id: "en_US".to_string(),
                response_audio_type: "audio/mpeg".to_string(),
            },
            transcription: TranscriptionConfig {
                endpoint: String::new(),
                language_code: "en-US".to_string(),
                poll_interval_ms: 2000,
                max_poll_attempts: 60,
                job_timeout_secs: 180,
            },
            audio: AudioConfig {
                target_sample_rate: 16000,
                target_channels: 1,
                max_upload_bytes: 10 * 1024 * 1024, // 10MB, matches the body limit
                ffmpeg_path: "ffmpeg".to_string(),
            },
            storage: StorageConfig {
                scratch_dir: "uploads".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: Override server host
    /// - `APP_DIALOG_BOTID=ABCD1234`: Override the dialog bot id
    /// - `HOST=0.0.0.0` / `PORT=3000`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            // APP_DIALOG_BOTID becomes dialog.botid etc.
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Dialog bot identifiers, locale, and endpoint are present
    /// - Poll policy bounds are all non-zero (a zero bound would either
    ///   spin or wait forever)
    /// - Audio target format and upload cap are non-zero
    /// - A scratch directory is configured
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.dialog.endpoint.is_empty() {
            return Err(anyhow::anyhow!("Dialog endpoint must be configured"));
        }

        if self.dialog.bot_id.is_empty() || self.dialog.bot_alias_id.is_empty() {
            return Err(anyhow::anyhow!("Dialog bot id and bot alias id must be configured"));
        }

        if self.dialog.locale_id.is_empty() {
            return Err(anyhow::anyhow!("Dialog locale id must be configured"));
        }

        if self.transcription.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("Transcription poll interval must be greater than 0"));
        }

        if self.transcription.max_poll_attempts == 0 {
            return Err(anyhow::anyhow!("Transcription max poll attempts must be greater than 0"));
        }

        if self.transcription.job_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Transcription job timeout must be greater than 0"));
        }

        if self.audio.target_sample_rate == 0 || self.audio.target_channels == 0 {
            return Err(anyhow::anyhow!("Audio target format must be non-zero"));
        }

        if self.audio.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.storage.scratch_dir.is_empty() {
            return Err(anyhow::anyhow!("Scratch directory must be configured"));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// Only the fields present in the JSON are touched; everything else keeps
    /// its current value. The updated configuration is re-validated before
    /// this returns.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(dialog) = partial_config.get("dialog") {
            if let Some(endpoint) = dialog.get("endpoint").and_then(|v| v.as_str()) {
                self.dialog.endpoint = endpoint.to_string();
            }
            if let Some(region) = dialog.get("region").and_then(|v| v.as_str()) {
                self.dialog.region = region.to_string();
            }
            if let Some(bot_id) = dialog.get("bot_id").and_then(|v| v.as_str()) {
                self.dialog.bot_id = bot_id.to_string();
            }
            if let Some(alias) = dialog.get("bot_alias_id").and_then(|v| v.as_str()) {
                self.dialog.bot_alias_id = alias.to_string();
            }
            if let Some(locale) = dialog.get("locale_id").and_then(|v| v.as_str()) {
                self.dialog.locale_id = locale.to_string();
            }
        }

        if let Some(transcription) = partial_config.get("transcription") {
            if let Some(endpoint) = transcription.get("endpoint").and_then(|v| v.as_str()) {
                self.transcription.endpoint = endpoint.to_string();
            }
            if let Some(language) = transcription.get("language_code").and_then(|v| v.as_str()) {
                self.transcription.language_code = language.to_string();
            }
            if let Some(interval) = transcription.get("poll_interval_ms").and_then(|v| v.as_u64()) {
                self.transcription.poll_interval_ms = interval;
            }
            if let Some(attempts) = transcription.get("max_poll_attempts").and_then(|v| v.as_u64()) {
                self.transcription.max_poll_attempts = attempts as u32;
            }
            if let Some(timeout) = transcription.get("job_timeout_secs").and_then(|v| v.as_u64()) {
                self.transcription.job_timeout_secs = timeout;
            }
        }

        if let Some(audio) = partial_config.get("audio") {
            if let Some(rate) = audio.get("target_sample_rate").and_then(|v| v.as_u64()) {
                self.audio.target_sample_rate = rate as u32;
            }
            if let Some(channels) = audio.get("target_channels").and_then(|v| v.as_u64()) {
                self.audio.target_channels = channels as u16;
            }
            if let Some(max) = audio.get("max_upload_bytes").and_then(|v| v.as_u64()) {
                self.audio.max_upload_bytes = max as usize;
            }
            if let Some(path) = audio.get("ffmpeg_path").and_then(|v| v.as_str()) {
                self.audio.ffmpeg_path = path.to_string();
            }
        }

        if let Some(storage) = partial_config.get("storage") {
            if let Some(dir) = storage.get("scratch_dir").and_then(|v| v.as_str()) {
                self.storage.scratch_dir = dir.to_string();
            }
        }

        self.validate()?;
        Ok(())
    }
}

/// API credentials for the cloud collaborators, read from the environment
/// once at startup. Kept out of `AppConfig` so they can never round-trip
/// through the config endpoints or a serialized config dump.
#[derive(Clone)]
pub struct Credentials {
    pub dialog_api_key: Option<String>,
    pub transcription_api_key: Option<String>,
}

impl Credentials {
    /// Read credentials from `DIALOG_API_KEY` / `TRANSCRIPTION_API_KEY`.
    /// Missing variables are allowed at startup so that health checks and
    /// config inspection work without live credentials; the clients reject
    /// calls that need a missing key.
    pub fn from_env() -> Self {
        Self {
            dialog_api_key: env::var("DIALOG_API_KEY").ok(),
            transcription_api_key: env::var("TRANSCRIPTION_API_KEY").ok(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Redacted: key material must never reach logs.
        f.debug_struct("Credentials")
            .field("dialog_api_key", &self.dialog_api_key.as_ref().map(|_| "<set>"))
            .field(
                "transcription_api_key",
                &self.transcription_api_key.as_ref().map(|_| "<set>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AppConfig {
        let mut config = AppConfig::default();
        config.dialog.endpoint = "https://dialog.example.test".to_string();
        config.dialog.bot_id = "BOT123".to_string();
        config.dialog.bot_alias_id = "ALIAS456".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.audio.target_sample_rate, 16000);
        assert_eq!(config.audio.target_channels, 1);
        // Defaults alone are not runnable: bot identifiers are deployment-specific.
        assert!(config.validate().is_err());
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = configured();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = configured();
        config.transcription.max_poll_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = configured();
        config.dialog.bot_id.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = configured();
        let json = r#"{"server": {"port": 9090}, "transcription": {"max_poll_attempts": 10}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.transcription.max_poll_attempts, 10);
        // Untouched fields keep their values.
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.dialog.bot_id, "BOT123");
    }

    #[test]
    fn test_config_update_rejects_invalid() {
        let mut config = configured();
        let json = r#"{"transcription": {"poll_interval_ms": 0}}"#;
        assert!(config.update_from_json(json).is_err());
    }

    #[test]
    fn test_request_content_type() {
        let config = configured();
        assert_eq!(
            config.audio.request_content_type(),
            "audio/l16; rate=16000; channels=1"
        );
    }
}
