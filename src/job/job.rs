use crate::job::data::{KpiValue, OutputAttachment};
use crate::job::error::JobError;
use crate::job::state::JobState;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const MIN_POLL_INTERVAL_MS: u64 = 1;

/// Caller-supplied polling schedule for [`Job::wait_for_completion`]
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PollPolicy {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    /// Growth factor applied to the interval after each poll
    pub multiplier: f64,
    /// Overall bound on waiting; `None` waits forever
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl PollPolicy {
    /// Never below one millisecond
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    pub fn next_interval(&self, current: Duration) -> Duration {
        let cap = self
            .max_interval_ms
            .max(self.initial_interval_ms)
            .max(MIN_POLL_INTERVAL_MS);
        let next = current.as_millis() as f64 * self.multiplier.max(1.0);
        Duration::from_millis((next as u64).clamp(MIN_POLL_INTERVAL_MS, cap))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Job trait: handle on one remote execution.
///
/// The handle is pull-based. Only [`Job::update_status`] talks to the platform;
/// every other reader works on the last fetched snapshot.
#[async_trait]
pub trait Job: Send + Sync {
    fn id(&self) -> &str;

    /// Fetch the remote status once and advance the cached snapshot.
    ///
    /// Terminal jobs are frozen: no fetch is made and the state is returned as is.
    async fn update_status(&mut self) -> Result<JobState, JobError>;

    fn state(&self) -> JobState;

    fn has_failure(&self) -> bool;

    fn has_solve_status(&self) -> bool;

    fn has_latest_engine_activity(&self) -> bool;

    fn solve_status(&self) -> Option<&str>;

    fn latest_engine_activity(&self) -> &[String];

    fn kpis(&self) -> &BTreeMap<String, KpiValue>;

    /// Engine log attachment, when the job returned one
    fn log(&self) -> Option<String>;

    /// Solution attachment, when the job returned one
    fn solution(&self) -> Option<String>;

    /// Failing phase plus the remote error text, for failed or canceled jobs
    fn failure(&self) -> Option<String>;

    /// Decoded output attachments; empty unless the job completed
    fn extract_output_data(&self) -> Vec<OutputAttachment>;

    /// Poll until the job reaches a terminal state or the policy's timeout elapses
    async fn wait_for_completion(&mut self, poll: &PollPolicy) -> Result<JobState, JobError> {
        let started = tokio::time::Instant::now();
        let mut interval = poll.initial_interval();

        loop {
            let state = self.update_status().await?;
            if state.is_terminal() {
                return Ok(state);
            }

            if let Some(timeout) = poll.timeout() {
                if started.elapsed() + interval > timeout {
                    return Err(JobError::Timeout {
                        id: self.id().to_string(),
                        state,
                    });
                }
            }

            debug!("Job {} is {}, polling again in {:?}", self.id(), state, interval);
            tokio::time::sleep(interval).await;
            interval = poll.next_interval(interval);
        }
    }
}
