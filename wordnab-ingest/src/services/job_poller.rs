//! Context Job Poller
//!
//! Drives one asynchronous context job from submission to a terminal state.
//!
//! **Algorithm:**
//! 1. Submit exactly once
//! 2. Poll up to `max_attempts` times
//!    a. completed: return payload (no further polls)
//!    b. failed: return `JobFailed` (no further polls)
//!    c. in progress: sleep `interval`, poll again
//! 3. Attempts exhausted while still in progress: `JobTimeout`
//!
//! The sleep happens only between polls, never after the last one. Every
//! call is an independent state machine; nothing is shared across calls.
//! Dropping the returned future abandons the job (the task id stays inert
//! on the backend).

use crate::types::{ContextJobBackend, ContextPayload, JobHandle, JobStatus, VocabError};
use chrono::Utc;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use wordnab_common::config::PollerConfig;
use wordnab_common::events::{EventBus, WordnabEvent};

/// Status strings the backend uses while a job is queued or running
pub const IN_PROGRESS_STATUSES: &[&str] = &[
    "pending",
    "queued",
    "started",
    "running",
    "retry",
    "in_progress",
];

/// Map a backend status report onto [`JobStatus`]
///
/// Unrecognized status strings are protocol failures, surfaced as
/// `Transport` rather than treated as pending.
pub fn parse_status(
    status: &str,
    context: Option<String>,
    error: Option<String>,
) -> Result<JobStatus, VocabError> {
    let normalized = status.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "completed" | "success" => match context {
            Some(context) => Ok(JobStatus::Completed(ContextPayload { context })),
            None => Err(VocabError::Transport(
                "job reported completed without a context payload".to_string(),
            )),
        },
        "failed" | "failure" => Ok(JobStatus::Failed {
            reason: error.unwrap_or_else(|| "unknown error".to_string()),
        }),
        s if IN_PROGRESS_STATUSES.contains(&s) => Ok(JobStatus::Pending),
        _ => Err(VocabError::Transport(format!(
            "unrecognized job status '{}'",
            status
        ))),
    }
}

/// Bounds for one polling run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    /// # Errors
    /// `InvalidInput` when `max_attempts` is zero
    pub fn new(max_attempts: u32, interval: Duration) -> Result<Self, VocabError> {
        if max_attempts == 0 {
            return Err(VocabError::InvalidInput(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            interval,
        })
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(10),
        }
    }
}

impl TryFrom<&PollerConfig> for PollPolicy {
    type Error = VocabError;

    fn try_from(config: &PollerConfig) -> Result<Self, Self::Error> {
        PollPolicy::new(config.max_attempts, config.interval())
    }
}

/// Lifecycle of one job as seen by the poller
#[derive(Debug)]
enum JobState {
    Pending { attempts: u32 },
    Completed { payload: ContextPayload, attempts: u32 },
    Failed { reason: String, attempts: u32 },
    TimedOut { attempts: u32 },
}

impl JobState {
    fn outcome(&self) -> &'static str {
        match self {
            JobState::Pending { .. } => "pending",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
            JobState::TimedOut { .. } => "timeout",
        }
    }
}

/// Polls context jobs to completion under a [`PollPolicy`]
#[derive(Debug, Clone)]
pub struct JobPoller {
    policy: PollPolicy,
    event_bus: Option<EventBus>,
}

impl JobPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            event_bus: None,
        }
    }

    /// Emit `ContextJobFinished` on the bus when a job reaches a terminal state
    pub fn with_events(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Submit once, then poll until a terminal state
    ///
    /// # Arguments
    /// * `submit` - Submits the job, returning its handle
    /// * `poll` - Fetches the current status for a handle
    ///
    /// # Errors
    /// * `JobFailed` - backend reported failure (no further polls)
    /// * `JobTimeout` - still in progress after `max_attempts` polls
    /// * `Transport` - submission or a poll could not complete
    pub async fn await_result<S, SF, P, PF>(
        &self,
        submit: S,
        mut poll: P,
    ) -> Result<ContextPayload, VocabError>
    where
        S: FnOnce() -> SF,
        SF: Future<Output = Result<JobHandle, VocabError>>,
        P: FnMut(JobHandle) -> PF,
        PF: Future<Output = Result<JobStatus, VocabError>>,
    {
        let PollPolicy {
            max_attempts,
            interval,
        } = self.policy;
        if max_attempts == 0 {
            return Err(VocabError::InvalidInput(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let handle = submit().await?;
        let start_time = Instant::now();
        debug!(task_id = %handle, max_attempts, "Context job submitted, polling");

        let mut state = JobState::Pending { attempts: 0 };
        while let JobState::Pending { attempts } = state {
            if attempts >= max_attempts {
                state = JobState::TimedOut { attempts };
                break;
            }
            if attempts > 0 {
                tokio::time::sleep(interval).await;
            }

            let attempt = attempts + 1;
            let status = match poll(handle.clone()).await {
                Ok(status) => status,
                Err(err) => {
                    warn!(
                        task_id = %handle,
                        attempt,
                        error = %err,
                        "Context job status check failed"
                    );
                    return Err(err);
                }
            };

            state = match status {
                JobStatus::Pending => {
                    debug!(task_id = %handle, attempt, "Context job still in progress");
                    JobState::Pending { attempts: attempt }
                }
                JobStatus::Completed(payload) => JobState::Completed {
                    payload,
                    attempts: attempt,
                },
                JobStatus::Failed { reason } => JobState::Failed {
                    reason,
                    attempts: attempt,
                },
            };
        }

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        self.emit_finished(&handle, &state);

        match state {
            JobState::Completed { payload, attempts } => {
                info!(task_id = %handle, attempts, elapsed_ms, "Context job completed");
                Ok(payload)
            }
            JobState::Failed { reason, attempts } => {
                warn!(task_id = %handle, attempts, elapsed_ms, reason = %reason, "Context job failed");
                Err(VocabError::JobFailed {
                    task_id: handle.0,
                    reason,
                })
            }
            JobState::TimedOut { attempts } => {
                warn!(task_id = %handle, attempts, elapsed_ms, "Context job timed out");
                Err(VocabError::JobTimeout {
                    task_id: handle.0,
                    attempts,
                })
            }
            JobState::Pending { attempts } => Err(VocabError::JobTimeout {
                task_id: handle.0,
                attempts,
            }),
        }
    }

    /// Submit `source_line` to a [`ContextJobBackend`] and wait for its context
    pub async fn await_context(
        &self,
        backend: &dyn ContextJobBackend,
        source_line: &str,
    ) -> Result<ContextPayload, VocabError> {
        self.await_result(
            || backend.submit_context_job(source_line),
            |handle| async move { backend.job_status(&handle).await },
        )
        .await
    }

    fn emit_finished(&self, handle: &JobHandle, state: &JobState) {
        let Some(bus) = &self.event_bus else {
            return;
        };
        let attempts = match state {
            JobState::Pending { attempts }
            | JobState::Completed { attempts, .. }
            | JobState::Failed { attempts, .. }
            | JobState::TimedOut { attempts } => *attempts,
        };
        bus.emit_lossy(WordnabEvent::ContextJobFinished {
            task_id: handle.0.clone(),
            outcome: state.outcome().to_string(),
            attempts,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn payload(text: &str) -> ContextPayload {
        ContextPayload {
            context: text.to_string(),
        }
    }

    /// Poll closure replaying scripted statuses and counting calls
    fn scripted(
        statuses: Vec<Result<JobStatus, VocabError>>,
    ) -> (
        Arc<AtomicU32>,
        impl FnMut(JobHandle) -> std::future::Ready<Result<JobStatus, VocabError>>,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let queue = Arc::new(Mutex::new(VecDeque::from(statuses)));
        let poll = move |_handle: JobHandle| {
            counter.fetch_add(1, Ordering::SeqCst);
            let next = queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(JobStatus::Pending));
            std::future::ready(next)
        };
        (calls, poll)
    }

    fn submit_ok() -> std::future::Ready<Result<JobHandle, VocabError>> {
        std::future::ready(Ok(JobHandle("task-1".to_string())))
    }

    fn poller(max_attempts: u32) -> JobPoller {
        JobPoller::new(PollPolicy::new(max_attempts, Duration::from_millis(10)).unwrap())
    }

    #[tokio::test]
    async fn test_completed_on_second_poll_stops_polling() {
        let (calls, poll) = scripted(vec![
            Ok(JobStatus::Pending),
            Ok(JobStatus::Completed(payload("Je vois la vie en rose / I see life in pink"))),
        ]);

        let result = poller(3).await_result(submit_ok, poll).await;

        assert_eq!(
            result.unwrap(),
            payload("Je vois la vie en rose / I see life in pink")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_all_pending_times_out_not_fails() {
        let (calls, poll) = scripted(vec![]);

        let result = poller(4).await_result(submit_ok, poll).await;

        assert_eq!(
            result,
            Err(VocabError::JobTimeout {
                task_id: "task-1".to_string(),
                attempts: 4
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failed_status_stops_immediately() {
        let (calls, poll) = scripted(vec![
            Ok(JobStatus::Failed {
                reason: "model overloaded".to_string(),
            }),
            Ok(JobStatus::Completed(payload("never reached"))),
        ]);

        let result = poller(5).await_result(submit_ok, poll).await;

        assert!(matches!(
            result,
            Err(VocabError::JobFailed { ref reason, .. }) if reason == "model overloaded"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_transport_error_propagates() {
        let (calls, poll) = scripted(vec![
            Ok(JobStatus::Pending),
            Err(VocabError::Transport("connection reset".to_string())),
            Ok(JobStatus::Completed(payload("never reached"))),
        ]);

        let result = poller(5).await_result(submit_ok, poll).await;

        assert_eq!(
            result,
            Err(VocabError::Transport("connection reset".to_string()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_submit_failure_never_polls() {
        let (calls, poll) = scripted(vec![Ok(JobStatus::Completed(payload("x")))]);

        let result = poller(3)
            .await_result(
                || std::future::ready(Err(VocabError::Transport("refused".to_string()))),
                poll,
            )
            .await;

        assert!(matches!(result, Err(VocabError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_called_exactly_once() {
        let submits = AtomicU32::new(0);
        let (_, poll) = scripted(vec![
            Ok(JobStatus::Pending),
            Ok(JobStatus::Pending),
            Ok(JobStatus::Completed(payload("done"))),
        ]);

        let result = poller(5)
            .await_result(
                || {
                    submits.fetch_add(1, Ordering::SeqCst);
                    submit_ok()
                },
                poll,
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_only_between_polls() {
        let (_, poll) = scripted(vec![]);
        let policy = PollPolicy::new(3, Duration::from_secs(10)).unwrap();
        let start = tokio::time::Instant::now();

        let result = JobPoller::new(policy).await_result(submit_ok, poll).await;

        assert!(matches!(result, Err(VocabError::JobTimeout { attempts: 3, .. })));
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_finished_event_reports_outcome_and_attempts() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let (_, poll) = scripted(vec![
            Ok(JobStatus::Pending),
            Ok(JobStatus::Completed(payload("done"))),
        ]);

        poller(3)
            .with_events(bus)
            .await_result(submit_ok, poll)
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            WordnabEvent::ContextJobFinished {
                task_id,
                outcome,
                attempts,
                ..
            } => {
                assert_eq!(task_id, "task-1");
                assert_eq!(outcome, "completed");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(matches!(
            PollPolicy::new(0, Duration::from_secs(1)),
            Err(VocabError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_status_recognizes_in_progress_variants() {
        for status in IN_PROGRESS_STATUSES {
            assert_eq!(parse_status(status, None, None), Ok(JobStatus::Pending));
        }
        assert_eq!(parse_status("RUNNING", None, None), Ok(JobStatus::Pending));
    }

    #[test]
    fn test_parse_status_terminal_and_unknown() {
        assert_eq!(
            parse_status("completed", Some("ctx".to_string()), None),
            Ok(JobStatus::Completed(payload("ctx")))
        );
        assert_eq!(
            parse_status("failed", None, Some("boom".to_string())),
            Ok(JobStatus::Failed {
                reason: "boom".to_string()
            })
        );
        assert!(matches!(
            parse_status("completed", None, None),
            Err(VocabError::Transport(_))
        ));
        assert!(matches!(
            parse_status("exploded", None, None),
            Err(VocabError::Transport(_))
        ));
    }
}
