//! Editor payload parsing and normalization.

use tracing::info;
use trellis_config::{DeviceCategory, SafetyLevel, WorkflowDef};
use trellis_events::{SharedSink, WorkflowEvent};

use crate::error::ValidationError;
use crate::node::Node;
use crate::workflow::{Connection, Metadata, Workflow};

const DEFAULT_NAME: &str = "Untitled Workflow";
const DEFAULT_VERSION: &str = "1.0.0";

/// Validates and normalizes raw editor payloads into immutable workflows.
pub struct WorkflowParser {
  sink: SharedSink,
}

impl WorkflowParser {
  pub fn new(sink: SharedSink) -> Self {
    Self { sink }
  }

  /// Parse a raw payload into a [`Workflow`].
  ///
  /// Fails when `nodes` or `connections` are missing or not sequences, when
  /// `metadata` is absent, when node ids collide, or when a connection
  /// references an unknown node. Metadata defaults are filled and a
  /// complexity score is attached for downstream estimation.
  pub fn parse(&self, raw: &serde_json::Value) -> Result<Workflow, ValidationError> {
    if !raw.get("nodes").is_some_and(|v| v.is_array()) {
      return Err(ValidationError::NotASequence("nodes"));
    }
    if !raw.get("connections").is_some_and(|v| v.is_array()) {
      return Err(ValidationError::NotASequence("connections"));
    }
    if raw.get("metadata").is_none_or(|v| v.is_null()) {
      return Err(ValidationError::MissingMetadata);
    }

    let def: WorkflowDef =
      serde_json::from_value(raw.clone()).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    let nodes = normalize_nodes(&def)?;
    let connections = normalize_connections(&def, &nodes)?;
    let metadata = normalize_metadata(&def, &nodes, connections.len());

    let workflow = Workflow {
      workflow_id: uuid::Uuid::new_v4().to_string(),
      nodes,
      connections,
      metadata,
    };

    info!(
      workflow_id = %workflow.workflow_id,
      name = %workflow.metadata.name,
      node_count = workflow.nodes.len(),
      complexity = workflow.metadata.complexity,
      "workflow_parsed"
    );

    self.sink.emit(WorkflowEvent::WorkflowParsed {
      workflow_id: workflow.workflow_id.clone(),
      node_count: workflow.nodes.len(),
      complexity: workflow.metadata.complexity,
    });

    Ok(workflow)
  }
}

fn normalize_nodes(def: &WorkflowDef) -> Result<Vec<Node>, ValidationError> {
  let mut seen = std::collections::HashSet::new();
  let mut nodes = Vec::with_capacity(def.nodes.len());

  for node_def in &def.nodes {
    if !seen.insert(node_def.id) {
      return Err(ValidationError::DuplicateNodeId(node_def.id));
    }
    nodes.push(Node {
      id: node_def.id,
      node_type: node_def.node_type.clone(),
      device_id: node_def.data.device_id.clone(),
      capability: node_def.data.capability.clone(),
      action: node_def.data.action.clone(),
      parameters: node_def.data.parameters.clone(),
    });
  }

  Ok(nodes)
}

fn normalize_connections(
  def: &WorkflowDef,
  nodes: &[Node],
) -> Result<Vec<Connection>, ValidationError> {
  let known: std::collections::HashSet<u64> = nodes.iter().map(|n| n.id).collect();

  def
    .connections
    .iter()
    .map(|c| {
      if known.contains(&c.from.node) && known.contains(&c.to.node) {
        Ok(Connection {
          from: c.from.node,
          to: c.to.node,
        })
      } else {
        Err(ValidationError::UnknownConnectionNode {
          from: c.from.node,
          to: c.to.node,
        })
      }
    })
    .collect()
}

fn normalize_metadata(def: &WorkflowDef, nodes: &[Node], connection_count: usize) -> Metadata {
  let device_nodes = nodes.iter().filter(|n| n.is_device_node()).count();

  Metadata {
    name: def
      .metadata
      .name
      .clone()
      .unwrap_or_else(|| DEFAULT_NAME.to_string()),
    description: def.metadata.description.clone().unwrap_or_default(),
    version: def
      .metadata
      .version
      .clone()
      .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
    created_at: def.metadata.created_at.clone(),
    device_category: def.metadata.device_category.unwrap_or(DeviceCategory::Personal),
    safety_level: def.metadata.safety_level.unwrap_or(SafetyLevel::Medium),
    complexity: complexity_score(nodes.len(), connection_count, device_nodes),
  }
}

/// Monotonic in all three inputs; device nodes weigh heaviest because they
/// dominate execution time and safety load.
fn complexity_score(node_count: usize, connection_count: usize, device_node_count: usize) -> u32 {
  (node_count * 2 + connection_count + device_node_count * 3) as u32
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use serde_json::json;
  use trellis_events::NullSink;

  use super::*;

  fn parser() -> WorkflowParser {
    WorkflowParser::new(Arc::new(NullSink))
  }

  fn minimal_payload() -> serde_json::Value {
    json!({
      "nodes": [
        {"id": 1, "type": "device", "data": {"deviceId": "lamp-1", "capability": "power_on"}},
        {"id": 2, "type": "delay", "data": {}}
      ],
      "connections": [
        {"from": {"node": 1, "pinIndex": 0}, "to": {"node": 2, "pinIndex": 0}}
      ],
      "metadata": {}
    })
  }

  #[test]
  fn fills_defaults() {
    let workflow = parser().parse(&minimal_payload()).unwrap();
    assert_eq!(workflow.metadata.name, "Untitled Workflow");
    assert_eq!(workflow.metadata.version, "1.0.0");
    assert_eq!(workflow.metadata.device_category, DeviceCategory::Personal);
    assert_eq!(workflow.metadata.safety_level, SafetyLevel::Medium);
  }

  #[test]
  fn rejects_missing_nodes() {
    let err = parser()
      .parse(&json!({"connections": [], "metadata": {}}))
      .unwrap_err();
    assert!(matches!(err, ValidationError::NotASequence("nodes")));
  }

  #[test]
  fn rejects_non_sequence_connections() {
    let err = parser()
      .parse(&json!({"nodes": [], "connections": "oops", "metadata": {}}))
      .unwrap_err();
    assert!(matches!(err, ValidationError::NotASequence("connections")));
  }

  #[test]
  fn rejects_missing_metadata() {
    let err = parser()
      .parse(&json!({"nodes": [], "connections": []}))
      .unwrap_err();
    assert!(matches!(err, ValidationError::MissingMetadata));
  }

  #[test]
  fn rejects_duplicate_node_ids() {
    let payload = json!({
      "nodes": [
        {"id": 7, "type": "device", "data": {}},
        {"id": 7, "type": "device", "data": {}}
      ],
      "connections": [],
      "metadata": {}
    });
    let err = parser().parse(&payload).unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateNodeId(7)));
  }

  #[test]
  fn rejects_dangling_connection() {
    let payload = json!({
      "nodes": [{"id": 1, "type": "device", "data": {}}],
      "connections": [{"from": {"node": 1}, "to": {"node": 99}}],
      "metadata": {}
    });
    let err = parser().parse(&payload).unwrap_err();
    assert!(matches!(
      err,
      ValidationError::UnknownConnectionNode { from: 1, to: 99 }
    ));
  }

  #[test]
  fn complexity_is_monotonic() {
    let base = complexity_score(2, 1, 1);
    assert!(complexity_score(3, 1, 1) > base);
    assert!(complexity_score(2, 2, 1) > base);
    assert!(complexity_score(2, 1, 2) > base);
  }

  #[test]
  fn device_nodes_are_identified() {
    let workflow = parser().parse(&minimal_payload()).unwrap();
    assert_eq!(workflow.device_node_count(), 1);
    assert!(workflow.get_node(1).unwrap().is_device_node());
    assert!(!workflow.get_node(2).unwrap().is_device_node());
  }
}
