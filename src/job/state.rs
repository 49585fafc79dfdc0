use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a remote job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Submitted, not yet picked up (queued, pending, accepted)
    Created,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl JobState {
    /// Map a platform status string; unknown states yield `None`
    pub fn from_platform(state: &str) -> Option<JobState> {
        match state.to_ascii_lowercase().as_str() {
            "queued" | "pending" | "accepted" => Some(JobState::Created),
            "running" => Some(JobState::Running),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "canceled" | "cancelled" => Some(JobState::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Canceled
        )
    }

    /// Position in the lifecycle; transitions only move to a higher rank
    pub(crate) fn rank(&self) -> u8 {
        match self {
            JobState::Created => 0,
            JobState::Running => 1,
            JobState::Completed | JobState::Failed | JobState::Canceled => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
