//! # Bounded Job Polling
//!
//! The transcription service only offers "ask again later", so finishing a
//! job means polling. The wait here is bounded three ways, and whichever
//! bound trips first ends it:
//!
//! - a hard cap on the number of status checks (`max_attempts`)
//! - an overall wall-clock deadline (`deadline`)
//! - an external cancellation signal (server shutdown)
//!
//! Exhausting any bound surfaces as an [`AppError::ExternalService`]; the
//! job itself is left to the service to expire.

use super::JobStatus;
use crate::config::TranscriptionConfig;
use crate::error::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Bounds for one polling session.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Delay between consecutive status checks.
    pub interval: Duration,
    /// Hard cap on status checks.
    pub max_attempts: u32,
    /// Overall wall-clock deadline for the whole wait.
    pub deadline: Duration,
}

impl PollPolicy {
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            max_attempts: config.max_poll_attempts,
            deadline: Duration::from_secs(config.job_timeout_secs),
        }
    }
}

/// Poll `check` at a fixed interval until it reports a terminal state,
/// returning the completed job's transcript URI.
///
/// `check` is a closure producing one status lookup per call so the wait
/// logic stays independent of the HTTP client (and testable without it).
/// The first check runs immediately; each later one after `interval`.
pub async fn poll_until_complete<F, Fut>(
    policy: PollPolicy,
    cancel: watch::Receiver<bool>,
    mut check: F,
) -> AppResult<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<JobStatus>>,
{
    let wait = async {
        let mut ticker = tokio::time::interval(policy.interval);
        for attempt in 1..=policy.max_attempts {
            ticker.tick().await;
            match check().await? {
                JobStatus::Completed { transcript_uri } => {
                    debug!(attempt, "transcription job completed");
                    return Ok(transcript_uri);
                }
                JobStatus::Failed { reason } => {
                    return Err(AppError::ExternalService(format!(
                        "transcription job failed: {}",
                        reason
                    )));
                }
                JobStatus::InProgress => {
                    debug!(attempt, "transcription job still in progress");
                }
            }
        }
        Err(AppError::ExternalService(format!(
            "transcription job did not finish within {} status checks",
            policy.max_attempts
        )))
    };

    tokio::select! {
        result = tokio::time::timeout(policy.deadline, wait) => match result {
            Ok(outcome) => outcome,
            Err(_) => Err(AppError::ExternalService(format!(
                "transcription job did not finish within {}s",
                policy.deadline.as_secs()
            ))),
        },
        _ = cancelled(cancel) => Err(AppError::ExternalService(
            "wait for transcription job was cancelled".to_string(),
        )),
    }
}

/// Resolves when the cancellation signal becomes true; pends forever when
/// the sender is gone (no cancellation can arrive anymore).
async fn cancelled(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn quick_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts,
            deadline: Duration::from_secs(5),
        }
    }

    fn no_cancel() -> watch::Receiver<bool> {
        // Dropping the sender means no cancellation can ever arrive, which
        // `cancelled` treats as "pend forever".
        let (_tx, rx) = watch::channel(false);
        rx
    }

    #[tokio::test]
    async fn test_completes_when_job_finishes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let uri = poll_until_complete(quick_policy(10), no_cancel(), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Ok(JobStatus::InProgress)
                } else {
                    Ok(JobStatus::Completed {
                        transcript_uri: "uri".to_string(),
                    })
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(uri, "uri");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_after_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let err = poll_until_complete(quick_policy(3), no_cancel(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(JobStatus::InProgress)
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::ExternalService(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_job_surfaces_reason() {
        let err = poll_until_complete(quick_policy(10), no_cancel(), || async {
            Ok(JobStatus::Failed {
                reason: "unsupported codec".to_string(),
            })
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("unsupported codec"));
    }

    #[tokio::test]
    async fn test_check_error_propagates() {
        let err = poll_until_complete(quick_policy(10), no_cancel(), || async {
            Err(AppError::ExternalService("status endpoint down".to_string()))
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("status endpoint down"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_the_wait() {
        let policy = PollPolicy {
            interval: Duration::from_secs(2),
            max_attempts: u32::MAX,
            deadline: Duration::from_secs(30),
        };

        let err = poll_until_complete(policy, no_cancel(), || async {
            Ok(JobStatus::InProgress)
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("did not finish within 30s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_ends_the_wait() {
        let (tx, rx) = watch::channel(false);
        let policy = PollPolicy {
            interval: Duration::from_secs(60),
            max_attempts: u32::MAX,
            deadline: Duration::from_secs(3600),
        };

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });

        let err = poll_until_complete(policy, rx, || async { Ok(JobStatus::InProgress) })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("cancelled"));
    }
}
