//! Prelude module - common imports for skein pipelines.
//!
//! ```ignore
//! use skein_api::prelude::*;
//! ```

pub use crate::dataset::Dataset;
pub use crate::engine::{ExecutionEngine, Row};
pub use crate::graph::{ExecutionPlan, NodeId, OperatorKind, PlanRoot};
pub use crate::{Error, Result};
