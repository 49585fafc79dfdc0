use crate::job::data::{KpiValue, OutputAttachment, LOG_ATTACHMENT, SOLUTION_ATTACHMENT};
use crate::job::error::JobError;
use crate::job::job::Job;
use crate::job::snapshot::JobSnapshot;
use crate::job::state::JobState;
use crate::platform::{resource_id, ApiError, Platform, ResourceKind};
use crate::retry::{retry, RetryPolicy};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Job handle backed by the platform's deployment-jobs resource
pub struct RemoteJob {
    id: String,
    space_id: String,
    platform: Arc<dyn Platform>,
    retry: RetryPolicy,
    state: JobState,
    /// Last non-terminal state observed, reported as the failing phase
    phase: JobState,
    snapshot: JobSnapshot,
}

impl RemoteJob {
    /// Handle for a job that was just submitted; no status has been fetched yet
    pub fn created(
        id: impl Into<String>,
        space_id: impl Into<String>,
        platform: Arc<dyn Platform>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            id: id.into(),
            space_id: space_id.into(),
            platform,
            retry,
            state: JobState::Created,
            phase: JobState::Created,
            snapshot: JobSnapshot::created(),
        }
    }

    /// Handle built from an already fetched job document
    pub fn from_document(
        doc: &Value,
        space_id: impl Into<String>,
        platform: Arc<dyn Platform>,
        retry: RetryPolicy,
    ) -> Result<Self, JobError> {
        let id = resource_id(doc)
            .ok_or_else(|| JobError::Decode {
                id: String::new(),
                reason: "missing metadata.id".to_string(),
            })?
            .to_string();

        let mut job = Self::created(id, space_id, platform, retry);
        job.apply(doc)?;
        Ok(job)
    }

    fn apply(&mut self, doc: &Value) -> Result<(), JobError> {
        let snapshot = JobSnapshot::from_document(doc).map_err(|reason| JobError::Decode {
            id: self.id.clone(),
            reason,
        })?;

        match snapshot.state {
            Some(next) if next.rank() >= self.state.rank() => {
                if next != self.state {
                    info!("Job {} moved from {} to {}", self.id, self.state, next);
                }
                self.state = next;
            }
            Some(next) => {
                debug!(
                    "Job {} reported {} after {}; keeping {}",
                    self.id, next, self.state, self.state
                );
            }
            None => warn!("Job {} reported an unknown state; keeping {}", self.id, self.state),
        }
        if !self.state.is_terminal() {
            self.phase = self.state;
        }

        self.snapshot = snapshot;
        Ok(())
    }

    fn attachment_text(&self, id: &str) -> Option<String> {
        self.snapshot
            .outputs
            .iter()
            .find(|output| output.id == id)
            .map(|output| String::from_utf8_lossy(&output.content).into_owned())
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            JobState::Running => "running",
            _ => "queued",
        }
    }
}

#[async_trait]
impl Job for RemoteJob {
    fn id(&self) -> &str {
        &self.id
    }

    async fn update_status(&mut self) -> Result<JobState, JobError> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        let doc = retry(
            &self.retry,
            &format!("fetch status of job {}", self.id),
            ApiError::is_transient,
            || {
                self.platform
                    .get(ResourceKind::Job, Some(self.space_id.as_str()), &self.id)
            },
        )
        .await?;

        self.apply(&doc)?;
        Ok(self.state)
    }

    fn state(&self) -> JobState {
        self.state
    }

    fn has_failure(&self) -> bool {
        match self.state {
            JobState::Failed | JobState::Canceled => true,
            JobState::Completed => false,
            _ => !self.snapshot.errors.is_empty(),
        }
    }

    fn has_solve_status(&self) -> bool {
        self.snapshot.solve_status.is_some()
    }

    fn has_latest_engine_activity(&self) -> bool {
        !self.snapshot.latest_engine_activity.is_empty()
    }

    fn solve_status(&self) -> Option<&str> {
        self.snapshot.solve_status.as_deref()
    }

    fn latest_engine_activity(&self) -> &[String] {
        &self.snapshot.latest_engine_activity
    }

    fn kpis(&self) -> &BTreeMap<String, KpiValue> {
        &self.snapshot.kpis
    }

    fn log(&self) -> Option<String> {
        self.attachment_text(LOG_ATTACHMENT)
    }

    fn solution(&self) -> Option<String> {
        self.attachment_text(SOLUTION_ATTACHMENT)
    }

    fn failure(&self) -> Option<String> {
        if !self.has_failure() {
            return None;
        }

        let outcome = match self.state {
            JobState::Canceled => "canceled",
            _ => "failed",
        };
        let mut text = format!("Job {} {} while {}", self.id, outcome, self.phase_label());

        let errors: Vec<String> = self
            .snapshot
            .errors
            .iter()
            .map(|e| match (e.code.is_empty(), e.message.is_empty()) {
                (false, false) => format!("{}: {}", e.code, e.message),
                (true, _) => e.message.clone(),
                (false, true) => e.code.clone(),
            })
            .collect();
        if !errors.is_empty() {
            text.push_str(": ");
            text.push_str(&errors.join("; "));
        }
        Some(text)
    }

    fn extract_output_data(&self) -> Vec<OutputAttachment> {
        if self.state != JobState::Completed {
            return Vec::new();
        }
        self.snapshot.outputs.clone()
    }
}
