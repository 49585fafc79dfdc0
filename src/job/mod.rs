pub mod data;
pub mod error;
#[allow(clippy::module_inception)]
pub mod job;
pub mod remote;
pub mod snapshot;
pub mod state;

pub use data::{DataReference, InlineContent, JobRequest, KpiValue, OutputAttachment};
pub use error::JobError;
pub use job::{Job, PollPolicy};
pub use remote::RemoteJob;
pub use state::JobState;
