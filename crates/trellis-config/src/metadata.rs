use serde::{Deserialize, Serialize};

use crate::enums::{DeviceCategory, SafetyLevel};

/// Workflow metadata as exported by the editor.
///
/// Every field is optional on the wire; the parser fills defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDef {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub device_category: Option<DeviceCategory>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub safety_level: Option<SafetyLevel>,
}
