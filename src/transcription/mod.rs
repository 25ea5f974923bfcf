//! # Transcription Service Integration
//!
//! Client for the asynchronous cloud transcription service and the bounded
//! poll that watches a submitted job until it reaches a terminal state.
//!
//! ## Job Lifecycle:
//! 1. **Submit**: upload audio + language code + media format, get a job name
//! 2. **Poll**: fixed-interval status checks, bounded by an attempt cap and
//!    an overall deadline, cancellable via a shutdown signal
//! 3. **Fetch**: download the result document and extract the transcript

pub mod client;
pub mod poller;

pub use client::TranscriptionClient;
pub use poller::{poll_until_complete, PollPolicy};

/// Status of a submitted transcription job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Still queued or running; keep polling.
    InProgress,

    /// Terminal success; the transcript document is ready at this URI.
    Completed { transcript_uri: String },

    /// Terminal failure reported by the service.
    Failed { reason: String },
}
