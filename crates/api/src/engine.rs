//! Execution engine contract.
//!
//! The engine that actually runs a plan across the cluster is an external
//! collaborator. This core consumes exactly three operations from it:
//! submit a plan and block until done, read the rows of a materialized
//! dataset, and read a single-row scalar.

use crate::graph::{ExecutionPlan, NodeId};
use crate::{Error, Result};

/// One materialized record.
pub type Row = serde_json::Value;

/// The distributed execution engine, as seen by the client.
///
/// `submit_and_wait` executes every dataset in the plan as one distributed
/// job and blocks until all of them, including scalar ones, are
/// materialized. Failure of any constituent computation fails the call.
/// Retry policy, timeouts and cancellation all live behind this trait.
pub trait ExecutionEngine {
    /// Execute the plan as one job, blocking until every root is
    /// materialized.
    fn submit_and_wait(&self, plan: &ExecutionPlan) -> Result<()>;

    /// Rows of a dataset materialized by a previous `submit_and_wait`.
    fn materialized_rows(&self, id: NodeId) -> Result<Vec<Row>>;

    /// The single row of a scalar dataset.
    ///
    /// Fails with [`Error::NotSingleRow`] unless the dataset resolved to
    /// exactly one row.
    fn single_value(&self, id: NodeId) -> Result<Row> {
        let mut rows = self.materialized_rows(id)?;
        if rows.len() != 1 {
            return Err(Error::NotSingleRow(rows.len()));
        }
        Ok(rows.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FixedRows(RefCell<Vec<Row>>);

    impl ExecutionEngine for FixedRows {
        fn submit_and_wait(&self, _plan: &ExecutionPlan) -> Result<()> {
            Ok(())
        }

        fn materialized_rows(&self, _id: NodeId) -> Result<Vec<Row>> {
            Ok(self.0.borrow().clone())
        }
    }

    #[test]
    fn test_single_value_requires_exactly_one_row() {
        let engine = FixedRows(RefCell::new(vec![serde_json::json!(true)]));
        assert_eq!(engine.single_value(NodeId(0)).unwrap(), serde_json::json!(true));

        *engine.0.borrow_mut() = vec![];
        assert!(matches!(
            engine.single_value(NodeId(0)),
            Err(Error::NotSingleRow(0))
        ));

        *engine.0.borrow_mut() = vec![serde_json::json!(1), serde_json::json!(2)];
        assert!(matches!(
            engine.single_value(NodeId(0)),
            Err(Error::NotSingleRow(2))
        ));
    }
}
