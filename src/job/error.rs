use crate::job::state::JobState;
use crate::platform::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Failed to fetch job status: {0}")]
    Api(#[from] ApiError),

    #[error("Unexpected status document for job {id}: {reason}")]
    Decode { id: String, reason: String },

    #[error("Job {id} did not finish in time (last state: {state})")]
    Timeout { id: String, state: JobState },
}

impl JobError {
    pub fn is_transient(&self) -> bool {
        matches!(self, JobError::Api(e) if e.is_transient())
    }
}
