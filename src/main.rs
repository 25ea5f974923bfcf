//! # Voicebot Backend - Main Application Entry Point
//!
//! HTTP server that proxies voice and text input to a cloud dialog service
//! and an asynchronous transcription service.
//!
//! ## Application Architecture:
//! - **config**: Layered configuration (TOML file + environment variables)
//! - **state**: Shared application state, metrics, and the shutdown signal
//! - **audio**: WAV inspection, normalization, transcoding, scratch files
//! - **envelope**: Compressed codec for string-typed session-state fields
//! - **dialog / transcription**: Clients for the cloud collaborators
//! - **handlers**: HTTP request handlers for the API endpoints
//! - **middleware**: Request logging and metrics collection
//! - **error**: Error types and their HTTP responses

mod audio;
mod config;
mod dialog;
mod envelope;
mod error;
mod handlers;
mod health;
mod middleware;
mod state;
mod transcription;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use config::{AppConfig, Credentials};
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown flag set by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting voicebot-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    info!("Scratch directory: {}", config.storage.scratch_dir);

    let credentials = Credentials::from_env();
    let app_state = AppState::new(config.clone(), credentials)?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    // Signal handlers flip the global flag and the state's shutdown signal,
    // which also cancels any in-flight transcription polls.
    setup_signal_handlers(app_state.clone());

    info!("Starting HTTP server on {}", bind_addr);

    let max_body = config.audio.max_upload_bytes;
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().limit(max_body))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/config", web::put().to(handlers::update_config))
                    .route("/converse/audio", web::post().to(handlers::converse_audio))
                    .route("/converse/text", web::post().to(handlers::converse_text))
                    .route("/transcribe", web::post().to(handlers::transcribe_audio)),
            )
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the default
/// filter of "voicebot_backend=debug,actix_web=info".
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voicebot_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Listen for SIGTERM/SIGINT and flip both shutdown signals: the global
/// flag (which stops the accept loop) and the state's watch channel (which
/// cancels in-flight waits on external jobs).
fn setup_signal_handlers(app_state: AppState) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        app_state.trigger_shutdown();
        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Resolve once the shutdown flag is set, checking every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
