//! Client-visible job status.

use serde::{Deserialize, Serialize};

/// Status of a submitted job, as seen by the client.
///
/// `Waiting` and `Running` may be observed repeatedly; the terminal states
/// are sticky and never re-derived once observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    NotSubmitted,
    Waiting,
    Running,
    Success,
    Failure,
    Cancelled,
}

impl JobStatus {
    /// Whether this status can never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failure | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::NotSubmitted => "not submitted",
            JobStatus::Waiting => "waiting",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
