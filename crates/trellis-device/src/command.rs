use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use trellis_config::DeviceCategory;

/// One capability invocation handed to a device executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
  pub command_id: String,
  pub execution_id: String,
  pub device_id: String,
  pub device_category: DeviceCategory,
  pub capability: String,
  #[serde(default)]
  pub parameters: HashMap<String, serde_json::Value>,
  /// Expected result for post-hoc verification, when the editor supplied one.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expected_result: Option<serde_json::Value>,
}

/// Result of a device operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome {
  pub result: serde_json::Value,
  pub metrics: OperationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetrics {
  pub safety_compliant: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration_ms: Option<u64>,
}
