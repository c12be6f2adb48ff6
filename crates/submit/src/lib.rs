//! Skein job submission
//!
//! Thin adapter between a skein client configuration and an external
//! cluster job scheduler. The scheduler itself is an external collaborator
//! consumed through the [`adapter::ClusterScheduler`] trait; this crate
//! only validates configuration, maps scheduler-specific states onto the
//! [`status::JobStatus`] enumeration, and keeps terminal states sticky.

pub mod adapter;
pub mod config;
pub mod status;

pub use adapter::{ClusterScheduler, JobDescription, JobSubmission, SchedulerState};
pub use config::ClusterConfig;
pub use status::JobStatus;

/// Result type for submission operations.
pub type Result<T> = std::result::Result<T, SubmitError>;

/// Errors raised by the submission adapter.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("job minimum node count must be at least 2")]
    MinNodesTooLow,

    #[error("cluster name must be specified before submitting")]
    ClusterNameUnspecified,

    #[error("failed to submit job to cluster '{cluster}'")]
    SubmissionFailed {
        cluster: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("job option '{0}' is not supported")]
    UnsupportedOption(String),

    #[error("no job id available before submission")]
    NotYetSubmitted,
}
