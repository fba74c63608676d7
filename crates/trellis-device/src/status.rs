use serde::{Deserialize, Serialize};

/// Health snapshot reported by a device status provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
  pub is_online: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub battery_level: Option<u8>,
  #[serde(default)]
  pub supported_capabilities: Vec<String>,
}

impl DeviceStatus {
  pub fn supports(&self, capability: &str) -> bool {
    self
      .supported_capabilities
      .iter()
      .any(|c| c == capability)
  }
}
