//! Logical graph representation and executable plans.
//!
//! Every dataset operation allocates an immutable [`LogicalNode`] referencing
//! its input nodes. Nothing executes on composition; submission builds an
//! [`ExecutionPlan`] by traversing the node graph, which is the artifact
//! handed to the execution engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Identifier of a vertex inside one execution plan.
///
/// Ids are assigned during plan construction and are only meaningful
/// relative to the plan that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One node of the deferred computation graph.
///
/// Nodes are immutable once created and reference their inputs by `Arc`,
/// so the graph is a tree of ownership and never cyclic.
#[derive(Debug)]
pub(crate) struct LogicalNode {
    pub operator: OperatorKind,
    pub inputs: Vec<Arc<LogicalNode>>,
}

impl LogicalNode {
    pub(crate) fn source(operator: OperatorKind) -> Arc<Self> {
        Arc::new(Self {
            operator,
            inputs: Vec::new(),
        })
    }

    pub(crate) fn unary(operator: OperatorKind, input: Arc<LogicalNode>) -> Arc<Self> {
        Arc::new(Self {
            operator,
            inputs: vec![input],
        })
    }

    pub(crate) fn binary(
        operator: OperatorKind,
        left: Arc<LogicalNode>,
        right: Arc<LogicalNode>,
    ) -> Arc<Self> {
        Arc::new(Self {
            operator,
            inputs: vec![left, right],
        })
    }
}

/// Operator descriptor carried by each graph node.
///
/// Function fields hold the type names of the user callables (or the names
/// of registered stage functions); the engine-side code generator resolves
/// them when compiling the plan. This core never invokes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperatorKind {
    /// Named external input.
    Source { name: String },
    /// 1:1 record transform.
    Map { function: String },
    /// Keeps records satisfying a predicate.
    Filter { predicate: String },
    /// 1:N record transform.
    FlatMap { function: String },
    /// Hash-exchange by key, then reduce each group.
    GroupBy { key_selector: String, reducer: String },
    /// Per-partition apply of a registered stage function.
    Apply { function: String },
    /// Per-partition apply over two inputs. When `broadcast_right` is set,
    /// every partition of the left input sees the whole right input.
    ApplyBinary { function: String, broadcast_right: bool },
    /// Repartition into a fixed number of hash partitions.
    HashPartition { key_selector: String, partitions: u32 },
}

impl OperatorKind {
    /// Short display name for plan listings.
    pub fn display_name(&self) -> &'static str {
        match self {
            OperatorKind::Source { .. } => "Source",
            OperatorKind::Map { .. } => "Map",
            OperatorKind::Filter { .. } => "Filter",
            OperatorKind::FlatMap { .. } => "FlatMap",
            OperatorKind::GroupBy { .. } => "GroupBy",
            OperatorKind::Apply { .. } => "Apply",
            OperatorKind::ApplyBinary { .. } => "ApplyBinary",
            OperatorKind::HashPartition { .. } => "HashPartition",
        }
    }
}

/// Type-erased reference to a dataset's graph node.
///
/// Used to assemble an [`ExecutionPlan`] over datasets of mixed record
/// types, e.g. a loop body output together with its boolean condition.
#[derive(Clone)]
pub struct PlanRoot {
    pub(crate) node: Arc<LogicalNode>,
}

/// A vertex of an executable plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanVertex {
    /// Plan-local identifier.
    pub id: NodeId,
    /// Display name (shown in plan listings and engine UIs).
    pub name: String,
    /// Operator descriptor.
    pub operator: OperatorKind,
}

/// A data dependency between two plan vertices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEdge {
    pub source: NodeId,
    pub target: NodeId,
}

/// An executable plan produced from one or more dataset roots.
///
/// Vertices appear in dependency order: every vertex is preceded by all of
/// its inputs. Subgraphs shared between roots are emitted exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub vertices: Vec<PlanVertex>,
    pub edges: Vec<PlanEdge>,
    roots: Vec<NodeId>,
}

impl ExecutionPlan {
    /// Build a plan covering every listed root.
    pub fn build(roots: &[PlanRoot]) -> Self {
        let mut plan = ExecutionPlan {
            vertices: Vec::new(),
            edges: Vec::new(),
            roots: Vec::new(),
        };
        let mut assigned: HashMap<*const LogicalNode, NodeId> = HashMap::new();
        for root in roots {
            let id = plan.visit(&root.node, &mut assigned);
            plan.roots.push(id);
        }
        plan
    }

    fn visit(
        &mut self,
        node: &Arc<LogicalNode>,
        assigned: &mut HashMap<*const LogicalNode, NodeId>,
    ) -> NodeId {
        let key = Arc::as_ptr(node);
        if let Some(id) = assigned.get(&key) {
            return *id;
        }

        let input_ids: Vec<NodeId> = node
            .inputs
            .iter()
            .map(|input| self.visit(input, assigned))
            .collect();

        let id = NodeId(self.vertices.len() as u32);
        assigned.insert(key, id);
        self.vertices.push(PlanVertex {
            id,
            name: node.operator.display_name().to_string(),
            operator: node.operator.clone(),
        });
        for source in input_ids {
            self.edges.push(PlanEdge { source, target: id });
        }
        id
    }

    /// Plan ids of the requested roots, in the order they were passed to
    /// [`ExecutionPlan::build`].
    pub fn root_ids(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of vertices in the plan.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Validate the plan structure.
    pub fn validate(&self) -> crate::Result<()> {
        if self.vertices.is_empty() {
            return Err(crate::Error::Plan("plan has no vertices".to_string()));
        }
        let count = self.vertices.len() as u32;
        for edge in &self.edges {
            if edge.source.0 >= count || edge.target.0 >= count {
                return Err(crate::Error::Plan(format!(
                    "edge {} -> {} references an unknown vertex",
                    edge.source, edge.target
                )));
            }
        }
        for root in &self.roots {
            if root.0 >= count {
                return Err(crate::Error::Plan(format!("root {} not in plan", root)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dataset;

    #[test]
    fn test_shared_subgraph_emitted_once() {
        let base: Dataset<u32> = Dataset::source("numbers");
        let doubled = base.map(|n: u32| n * 2);
        let filtered = base.filter(|n: &u32| *n > 10);

        let plan = ExecutionPlan::build(&[doubled.plan_root(), filtered.plan_root()]);

        // source, map, filter: the shared source appears once
        assert_eq!(plan.vertex_count(), 3);
        assert_eq!(plan.edges.len(), 2);
        assert_eq!(plan.root_ids().len(), 2);
    }

    #[test]
    fn test_vertices_in_dependency_order() {
        let source: Dataset<String> = Dataset::source("lines");
        let out = source
            .select_many(|l: String| l.split(' ').map(String::from).collect::<Vec<_>>())
            .filter(|w: &String| !w.is_empty());

        let plan = ExecutionPlan::build(&[out.plan_root()]);

        for edge in &plan.edges {
            assert!(edge.source.0 < edge.target.0);
        }
        assert_eq!(plan.root_ids()[0], NodeId(2));
    }

    #[test]
    fn test_validate_rejects_dangling_edge() {
        let source: Dataset<u32> = Dataset::source("numbers");
        let mut plan = ExecutionPlan::build(&[source.plan_root()]);
        plan.edges.push(PlanEdge {
            source: NodeId(0),
            target: NodeId(7),
        });

        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_plan_round_trips_through_json() {
        let source: Dataset<u32> = Dataset::source("numbers");
        let out = source.map(|n: u32| n + 1);
        let plan = ExecutionPlan::build(&[out.plan_root()]);

        let encoded = serde_json::to_string(&plan).unwrap();
        let decoded: ExecutionPlan = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.vertex_count(), plan.vertex_count());
        assert_eq!(decoded.root_ids(), plan.root_ids());
    }
}
