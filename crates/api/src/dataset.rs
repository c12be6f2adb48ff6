//! Dataset API for building deferred pipelines.
//!
//! This module provides the fluent API for composing dataflow pipelines.
//! Operations are lazy: each one adds a node to the logical graph, and
//! nothing runs until a plan built from the dataset is submitted to an
//! execution engine.

use crate::graph::{LogicalNode, OperatorKind, PlanRoot};
use std::marker::PhantomData;
use std::sync::Arc;

/// A deferred dataset of records of type `T`.
///
/// A `Dataset` is an immutable handle to a node of a not-yet-executed
/// computation graph. Composing it produces a new dataset referencing the
/// old one; the original handle stays valid and can be composed again,
/// which is how iteration keeps both the pre- and post-round graphs alive.
///
/// # Example
///
/// ```ignore
/// let words: Dataset<String> = Dataset::source("documents")
///     .select_many(|line: String| line.split(' ').map(String::from).collect::<Vec<_>>())
///     .filter(|w: &String| !w.is_empty());
/// ```
pub struct Dataset<T> {
    pub(crate) node: Arc<LogicalNode>,
    _marker: PhantomData<T>,
}

impl<T> Clone for Dataset<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Dataset<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset").field("node", &self.node).finish()
    }
}

impl<T> Dataset<T> {
    pub(crate) fn from_node(node: Arc<LogicalNode>) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }

    /// Create a dataset referencing a named external input.
    pub fn source(name: impl Into<String>) -> Dataset<T> {
        Dataset::from_node(LogicalNode::source(OperatorKind::Source {
            name: name.into(),
        }))
    }

    /// Apply a map transformation.
    ///
    /// Transforms each record one-to-one using the provided function.
    pub fn map<U, F>(&self, _f: F) -> Dataset<U>
    where
        F: Fn(T) -> U + 'static,
    {
        Dataset::from_node(LogicalNode::unary(
            OperatorKind::Map {
                function: std::any::type_name::<F>().to_string(),
            },
            self.node.clone(),
        ))
    }

    /// Keep only records that satisfy the predicate.
    pub fn filter<F>(&self, _predicate: F) -> Dataset<T>
    where
        F: Fn(&T) -> bool + 'static,
    {
        Dataset::from_node(LogicalNode::unary(
            OperatorKind::Filter {
                predicate: std::any::type_name::<F>().to_string(),
            },
            self.node.clone(),
        ))
    }

    /// Transform each record into zero or more records.
    pub fn select_many<U, F>(&self, _f: F) -> Dataset<U>
    where
        F: Fn(T) -> Vec<U> + 'static,
    {
        Dataset::from_node(LogicalNode::unary(
            OperatorKind::FlatMap {
                function: std::any::type_name::<F>().to_string(),
            },
            self.node.clone(),
        ))
    }

    /// Hash-exchange records by key and reduce each group to one record.
    pub fn group_by<K, R, KF, RF>(&self, _key_selector: KF, _reducer: RF) -> Dataset<R>
    where
        KF: Fn(&T) -> K + 'static,
        RF: Fn(&K, Vec<T>) -> R + 'static,
    {
        Dataset::from_node(LogicalNode::unary(
            OperatorKind::GroupBy {
                key_selector: std::any::type_name::<KF>().to_string(),
                reducer: std::any::type_name::<RF>().to_string(),
            },
            self.node.clone(),
        ))
    }

    /// Apply a registered stage function to each partition independently.
    ///
    /// The function name must match an entry registered by the stage module
    /// (see the vertex runtime's entry registry).
    pub fn apply<U>(&self, function: impl Into<String>) -> Dataset<U> {
        Dataset::from_node(LogicalNode::unary(
            OperatorKind::Apply {
                function: function.into(),
            },
            self.node.clone(),
        ))
    }

    /// Apply a registered stage function per partition over two inputs.
    ///
    /// When `broadcast_right` is set, every partition of `self` sees the
    /// whole of `other`.
    pub fn apply_with<U, R>(
        &self,
        other: &Dataset<U>,
        function: impl Into<String>,
        broadcast_right: bool,
    ) -> Dataset<R> {
        Dataset::from_node(LogicalNode::binary(
            OperatorKind::ApplyBinary {
                function: function.into(),
                broadcast_right,
            },
            self.node.clone(),
            other.node.clone(),
        ))
    }

    /// Repartition the dataset into `partitions` hash partitions.
    pub fn hash_partition<K, KF>(&self, _key_selector: KF, partitions: u32) -> Dataset<T>
    where
        KF: Fn(&T) -> K + 'static,
    {
        Dataset::from_node(LogicalNode::unary(
            OperatorKind::HashPartition {
                key_selector: std::any::type_name::<KF>().to_string(),
                partitions,
            },
            self.node.clone(),
        ))
    }

    /// Type-erased handle for assembling an execution plan.
    pub fn plan_root(&self) -> PlanRoot {
        PlanRoot {
            node: self.node.clone(),
        }
    }

    /// Whether two dataset handles refer to the same graph node.
    pub fn same_graph(&self, other: &Dataset<T>) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ExecutionPlan;

    #[test]
    fn test_composition_is_deferred() {
        let source: Dataset<u32> = Dataset::source("numbers");
        let mapped = source.map(|n: u32| n * 2);

        // the original handle is untouched by composition
        assert!(!source.same_graph(&mapped.map(|n: u32| n)));
        assert_eq!(
            ExecutionPlan::build(&[mapped.plan_root()]).vertex_count(),
            2
        );
    }

    #[test]
    fn test_apply_with_references_both_inputs() {
        let left: Dataset<u32> = Dataset::source("left");
        let right: Dataset<String> = Dataset::source("right");
        let joined: Dataset<(u32, String)> = left.apply_with(&right, "pair_up", true);

        let plan = ExecutionPlan::build(&[joined.plan_root()]);
        assert_eq!(plan.vertex_count(), 3);
        assert_eq!(plan.edges.len(), 2);
    }

    #[test]
    fn test_group_by_records_selector_names() {
        let source: Dataset<String> = Dataset::source("words");
        let counted: Dataset<(String, usize)> =
            source.group_by(|w: &String| w.clone(), |k: &String, group| (k.clone(), group.len()));

        let plan = ExecutionPlan::build(&[counted.plan_root()]);
        match &plan.vertices[1].operator {
            crate::graph::OperatorKind::GroupBy { key_selector, reducer } => {
                assert!(!key_selector.is_empty());
                assert!(!reducer.is_empty());
            }
            other => panic!("expected GroupBy, got {:?}", other),
        }
    }
}
