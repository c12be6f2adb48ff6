//! Scheduler adapter.
//!
//! Maps the external scheduler's job lifecycle onto the client-visible
//! [`JobStatus`] enumeration. The scheduler's own state machine stays
//! behind the [`ClusterScheduler`] trait; this adapter only validates the
//! configuration, forwards submission, and derives status with sticky
//! terminal states.

use crate::config::ClusterConfig;
use crate::status::JobStatus;
use crate::{Result, SubmitError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Job state as reported by the external cluster scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Validating,
    Queued,
    Submitted,
    Configuring,
    Running,
    Canceling,
    Finishing,
    Failed,
    Canceled,
    Finished,
}

/// What the scheduler receives on submission.
#[derive(Debug, Clone, Default)]
pub struct JobDescription {
    pub friendly_name: String,
    pub min_nodes: Option<u32>,
    pub max_nodes: Option<u32>,
    pub node_group: Option<String>,
    pub runtime_limit: Option<Duration>,
    pub enable_speculative_duplication: bool,
    pub command_line: Option<String>,
    /// Files shipped alongside the job (stage modules, resources).
    pub files: Vec<PathBuf>,
    pub environment: HashMap<String, String>,
}

/// The external cluster job scheduler.
pub trait ClusterScheduler {
    /// Hand the job to the scheduler.
    fn submit(
        &mut self,
        job: &JobDescription,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Ask the scheduler to cancel the job.
    fn cancel(&mut self);

    /// Current scheduler-side job state.
    fn state(&self) -> SchedulerState;

    /// Scheduler-assigned job id, once one exists.
    fn id(&self) -> Option<i64>;

    /// Scheduler-side error message, if any.
    fn error_message(&self) -> Option<String>;
}

/// Adapter binding one client job to one scheduler submission.
pub struct JobSubmission<S: ClusterScheduler> {
    scheduler: S,
    config: ClusterConfig,
    status: JobStatus,
    submitted: bool,
    command_line: Option<String>,
    files: Vec<PathBuf>,
    error: Option<String>,
}

impl<S: ClusterScheduler> JobSubmission<S> {
    pub fn new(scheduler: S, config: ClusterConfig) -> Self {
        Self {
            scheduler,
            config,
            status: JobStatus::NotSubmitted,
            submitted: false,
            command_line: None,
            files: Vec::new(),
            error: None,
        }
    }

    /// Set a job option by name. Only the command line is supported.
    pub fn add_job_option(&mut self, field: &str, value: &str) -> Result<()> {
        if field == "cmdline" {
            self.command_line = Some(value.to_string());
            Ok(())
        } else {
            Err(SubmitError::UnsupportedOption(field.to_string()))
        }
    }

    /// Ship a local file alongside the job.
    pub fn add_local_file(&mut self, path: impl Into<PathBuf>) {
        self.files.push(path.into());
    }

    /// Validate the configuration and submit the job.
    ///
    /// Configuration errors fail before the scheduler is contacted.
    pub fn submit(&mut self) -> Result<()> {
        let cluster = self
            .config
            .cluster_name
            .clone()
            .ok_or(SubmitError::ClusterNameUnspecified)?;

        if matches!(self.config.min_nodes, Some(n) if n < 2) {
            return Err(SubmitError::MinNodesTooLow);
        }

        let job = JobDescription {
            friendly_name: self.config.friendly_name.clone(),
            min_nodes: self.config.min_nodes,
            max_nodes: self.config.max_nodes,
            node_group: self.config.node_group.clone(),
            runtime_limit: self.config.runtime_limit,
            enable_speculative_duplication: self.config.enable_speculative_duplication,
            command_line: self.command_line.clone(),
            files: self.files.clone(),
            environment: self.config.environment.clone(),
        };

        info!(
            cluster = %cluster,
            job = %job.friendly_name,
            files = job.files.len(),
            "submitting job"
        );

        self.scheduler
            .submit(&job)
            .map_err(|source| SubmitError::SubmissionFailed { cluster, source })?;
        self.submitted = true;
        Ok(())
    }

    /// Current client-visible status.
    ///
    /// Terminal states are cached and never re-derived.
    pub fn status(&mut self) -> JobStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        if !self.submitted {
            return JobStatus::NotSubmitted;
        }

        self.status = match self.scheduler.state() {
            SchedulerState::Validating | SchedulerState::Queued | SchedulerState::Submitted => {
                JobStatus::Waiting
            }
            SchedulerState::Configuring
            | SchedulerState::Running
            | SchedulerState::Canceling
            | SchedulerState::Finishing => JobStatus::Running,
            SchedulerState::Finished => JobStatus::Success,
            SchedulerState::Failed | SchedulerState::Canceled => {
                self.error = self.scheduler.error_message();
                JobStatus::Failure
            }
        };
        self.status
    }

    /// Cancel the job unless it already reached a terminal state.
    pub fn terminate(&mut self) -> JobStatus {
        let status = self.status();
        match status {
            JobStatus::Failure
            | JobStatus::NotSubmitted
            | JobStatus::Success
            | JobStatus::Cancelled => return status,
            JobStatus::Waiting | JobStatus::Running => {}
        }

        warn!(job = %self.config.friendly_name, "cancelling job");
        self.scheduler.cancel();
        self.status = JobStatus::Cancelled;
        self.status
    }

    /// Scheduler-assigned job id.
    pub fn job_id(&self) -> Result<i64> {
        self.scheduler.id().ok_or(SubmitError::NotYetSubmitted)
    }

    /// Scheduler-side error message, if one was captured.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
