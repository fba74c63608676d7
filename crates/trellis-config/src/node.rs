use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A node definition as exported by the visual editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  /// Numeric id, unique within the workflow.
  pub id: u64,
  /// Editor node type, e.g. "device", "delay", "condition".
  #[serde(rename = "type")]
  pub node_type: String,
  #[serde(default)]
  pub data: NodeDataDef,
  #[serde(default)]
  pub inputs: Vec<PinDef>,
  #[serde(default)]
  pub outputs: Vec<PinDef>,
}

impl NodeDef {
  /// A node that targets a device and carries either a capability or an
  /// action text qualifies as a device node.
  pub fn is_device_node(&self) -> bool {
    self.data.device_id.is_some()
      && (self.data.capability.is_some() || self.data.action.is_some())
  }
}

/// Payload attached to a node by the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDataDef {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub device_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub capability: Option<String>,
  /// Free-text action, e.g. "turn on the lamp". Resolved through the
  /// action translator when no explicit capability is present.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub action: Option<String>,
  #[serde(default)]
  pub parameters: HashMap<String, serde_json::Value>,
}

/// An input or output pin on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDef {
  pub label: String,
  #[serde(default)]
  pub kind: Option<String>,
}
