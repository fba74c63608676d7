use serde::{Deserialize, Serialize};
use trellis_config::{DeviceCategory, SafetyLevel};

use crate::graph::Graph;
use crate::node::Node;

/// A validated, immutable workflow ready for compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
  pub workflow_id: String,
  pub nodes: Vec<Node>,
  pub connections: Vec<Connection>,
  pub metadata: Metadata,
}

/// A directed edge: the target node's step depends on the source node's step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
  pub from: u64,
  pub to: u64,
}

/// Normalized metadata with defaults filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
  pub name: String,
  pub description: String,
  pub version: String,
  pub created_at: Option<String>,
  pub device_category: DeviceCategory,
  pub safety_level: SafetyLevel,
  /// Monotonic in node count, connection count, and device-node count.
  pub complexity: u32,
}

impl Workflow {
  /// Build the dependency graph for analysis and ordering.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.nodes, &self.connections)
  }

  /// Look up a node by id.
  pub fn get_node(&self, node_id: u64) -> Option<&Node> {
    self.nodes.iter().find(|n| n.id == node_id)
  }

  /// Number of nodes that target a device.
  pub fn device_node_count(&self) -> usize {
    self.nodes.iter().filter(|n| n.is_device_node()).count()
  }
}
