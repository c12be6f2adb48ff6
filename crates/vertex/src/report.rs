//! Vertex failure reporting.
//!
//! Both generated stage code and the entry bridge report through one
//! process-wide [`ErrorReporter`]. The common pattern is a double report:
//! stage code catches a failure, reports it and returns it, after which the
//! bridge reports the same failure object again. The reporter deduplicates
//! by object identity - never by content, since two distinct failures can
//! carry identical messages.

use crate::{Result, VertexError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};

/// Name of the failure artifact written to the vertex working directory.
pub const VERTEX_EXCEPTION_FILENAME: &str = "VertexException.txt";

/// A stage failure with shared identity.
///
/// The `Arc` is the deduplication key: reporting the same allocation twice
/// is a no-op the second time.
pub type StageFailure = Arc<anyhow::Error>;

/// Wrap any error as a reportable stage failure.
pub fn stage_failure(err: impl Into<anyhow::Error>) -> StageFailure {
    Arc::new(err.into())
}

/// Process-wide failure reporting state.
///
/// Constructed once per worker process and threaded explicitly to every
/// component that can observe a stage failure.
pub struct ErrorReporter {
    /// Error-code convention of the controlling system: 0 means failures
    /// propagate (fatal), any other value means they are suppressed and
    /// the code is read externally.
    error_code: i32,
    work_dir: PathBuf,
    last_reported: Mutex<Option<StageFailure>>,
}

impl ErrorReporter {
    /// Reporter writing its failure artifact to the current directory.
    pub fn new(error_code: i32) -> Self {
        Self::with_work_dir(error_code, ".")
    }

    /// Reporter writing its failure artifact to `work_dir`.
    pub fn with_work_dir(error_code: i32, work_dir: impl AsRef<Path>) -> Self {
        Self {
            error_code,
            work_dir: work_dir.as_ref().to_path_buf(),
            last_reported: Mutex::new(None),
        }
    }

    /// Report a stage failure.
    ///
    /// Repeat reports of the same failure object are ignored. A new
    /// failure is logged, written in full to the exception file, and then
    /// either handed back for propagation (error code 0) or suppressed so
    /// the controlling system reads the configured error code instead.
    pub fn report(&self, failure: &StageFailure) -> Result<()> {
        {
            let mut last = self.last_reported.lock();
            if let Some(prev) = last.as_ref() {
                if Arc::ptr_eq(prev, failure) {
                    return Ok(());
                }
            }
            *last = Some(failure.clone());
        }

        error!(error = ?failure, "vertex failed");

        let path = self.work_dir.join(VERTEX_EXCEPTION_FILENAME);
        if let Err(io_err) = std::fs::write(&path, format!("{:?}\n", failure)) {
            // keep the original failure; losing the artifact must not mask it
            warn!(path = %path.display(), error = %io_err, "failed to write exception file");
        }

        if self.error_code == 0 {
            Err(VertexError::Stage(failure.clone()))
        } else {
            Ok(())
        }
    }

    /// Whether any failure has been reported in this process.
    pub fn has_reported(&self) -> bool {
        self.last_reported.lock().is_some()
    }

    /// The configured error code.
    pub fn error_code(&self) -> i32 {
        self.error_code
    }
}
