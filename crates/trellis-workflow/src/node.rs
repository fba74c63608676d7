use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A normalized workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id: u64,
  pub node_type: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub device_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub capability: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub action: Option<String>,
  #[serde(default)]
  pub parameters: HashMap<String, serde_json::Value>,
}

impl Node {
  /// A device node targets a device and carries a capability or action.
  pub fn is_device_node(&self) -> bool {
    self.device_id.is_some() && (self.capability.is_some() || self.action.is_some())
  }
}
