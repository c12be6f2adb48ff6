//! Cluster submission configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for submitting a job to a cluster.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClusterConfig {
    /// Head node of the target cluster. Required for submission.
    pub cluster_name: Option<String>,
    /// Human-readable job name shown by the scheduler.
    pub friendly_name: String,
    /// Minimum node count. The graph manager needs a node of its own, so
    /// values below 2 are rejected.
    pub min_nodes: Option<u32>,
    /// Maximum node count.
    pub max_nodes: Option<u32>,
    /// Scheduler node group to run in.
    pub node_group: Option<String>,
    /// Wall-clock limit enforced by the scheduler.
    pub runtime_limit: Option<Duration>,
    /// Allow the scheduler to duplicate slow vertices speculatively.
    pub enable_speculative_duplication: bool,
    /// Environment variables forwarded to every vertex process.
    pub environment: HashMap<String, String>,
}

impl ClusterConfig {
    pub fn new(friendly_name: impl Into<String>) -> Self {
        Self {
            friendly_name: friendly_name.into(),
            ..Self::default()
        }
    }

    /// Set the target cluster head node.
    pub fn with_cluster(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    /// Set the node count range.
    pub fn with_nodes(mut self, min: u32, max: u32) -> Self {
        self.min_nodes = Some(min);
        self.max_nodes = Some(max);
        self
    }

    /// Set the scheduler node group.
    pub fn with_node_group(mut self, group: impl Into<String>) -> Self {
        self.node_group = Some(group.into());
        self
    }

    /// Set the scheduler-enforced runtime limit.
    pub fn with_runtime_limit(mut self, limit: Duration) -> Self {
        self.runtime_limit = Some(limit);
        self
    }

    /// Enable speculative duplication of slow vertices.
    pub fn with_speculative_duplication(mut self) -> Self {
        self.enable_speculative_duplication = true;
        self
    }

    /// Forward an environment variable to every vertex process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}
