//! Skein client API
//!
//! This crate provides the user-facing API for building skein dataflow
//! pipelines. Operations on a [`Dataset`] are deferred: they build up a
//! logical graph that is only executed when a plan is submitted to an
//! [`ExecutionEngine`].
//!
//! # Example
//!
//! ```ignore
//! use skein_api::prelude::*;
//!
//! let ranks: Dataset<(u64, f64)> = Dataset::source("ranks");
//!
//! let result = ranks.do_while(
//!     &engine,
//!     |current| current.apply("update_ranks"),
//!     |before, after| before.cross_product(after, |b: &(u64, f64), a: &(u64, f64)| b.1 - a.1)
//!         .apply("converged"),
//! )?;
//! ```

pub mod combinators;
pub mod dataset;
pub mod engine;
pub mod graph;
pub mod iteration;
pub mod prelude;

pub use dataset::Dataset;
pub use engine::{ExecutionEngine, Row};
pub use graph::{ExecutionPlan, NodeId, OperatorKind, PlanEdge, PlanRoot, PlanVertex};

/// Result type for skein client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or executing pipelines.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("iteration count must be non-negative, got {0}")]
    InvalidIterationCount(i32),

    #[error("scalar dataset resolved to {0} rows, expected exactly one")]
    NotSingleRow(usize),

    #[error("condition dataset did not yield a boolean value")]
    NotBoolean,

    #[error("invalid plan: {0}")]
    Plan(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
