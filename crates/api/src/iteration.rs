//! Iterative execution control.
//!
//! The termination condition of a dataflow loop is itself a deferred
//! computation: the cluster decides whether another round is needed, not
//! client-visible state. Each round therefore extends the graph with the
//! loop body, couples it with the boolean condition dataset, and submits
//! both as one job, blocking until the condition scalar is materialized.

use crate::engine::ExecutionEngine;
use crate::graph::ExecutionPlan;
use crate::{Dataset, Error, Result};
use tracing::debug;

impl<T> Dataset<T> {
    /// Repeat `body` while the cluster-computed `cond` stays true.
    ///
    /// `cond` receives the pre-round and post-round datasets and must yield
    /// a dataset with exactly one boolean row once executed. One submission
    /// happens per round, covering both the body output and the condition.
    /// Returns the final post-round dataset.
    pub fn do_while<E, B, C>(&self, engine: &E, body: B, cond: C) -> Result<Dataset<T>>
    where
        E: ExecutionEngine + ?Sized,
        B: Fn(&Dataset<T>) -> Dataset<T>,
        C: Fn(&Dataset<T>, &Dataset<T>) -> Dataset<bool>,
    {
        self.do_while_unrolled(engine, body, cond, 1)
    }

    /// [`do_while`](Dataset::do_while) with `unroll` body applications
    /// chained per round.
    ///
    /// Unrolling batches multiple logical iterations into a single
    /// executable graph per round, amortizing submission overhead when the
    /// condition does not need to be checked after every application.
    /// `unroll` must be non-negative; zero returns the source dataset
    /// unchanged without submitting anything.
    pub fn do_while_unrolled<E, B, C>(
        &self,
        engine: &E,
        body: B,
        cond: C,
        unroll: i32,
    ) -> Result<Dataset<T>>
    where
        E: ExecutionEngine + ?Sized,
        B: Fn(&Dataset<T>) -> Dataset<T>,
        C: Fn(&Dataset<T>, &Dataset<T>) -> Dataset<bool>,
    {
        if unroll < 0 {
            return Err(Error::InvalidIterationCount(unroll));
        }
        if unroll == 0 {
            return Ok(self.clone());
        }

        let mut before = self.clone();
        let mut round: u64 = 0;
        loop {
            round += 1;

            let mut after = before.clone();
            for _ in 0..unroll {
                after = body(&after);
            }
            let more = cond(&before, &after);

            // One job covers both graphs: the condition generally depends
            // on the body output, so they must materialize together.
            let plan = ExecutionPlan::build(&[after.plan_root(), more.plan_root()]);
            debug!(
                round,
                vertices = plan.vertex_count(),
                "submitting iteration round"
            );
            engine.submit_and_wait(&plan)?;

            let flag = engine.single_value(plan.root_ids()[1])?;
            let proceed = flag.as_bool().ok_or(Error::NotBoolean)?;
            debug!(round, proceed, "iteration round finished");

            if !proceed {
                return Ok(after);
            }
            before = after;
        }
    }
}
