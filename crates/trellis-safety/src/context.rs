use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use trellis_config::DeviceCategory;

/// Priority attached to an operation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
  Normal,
  High,
  Urgent,
  Emergency,
}

impl Priority {
  pub fn is_elevated(&self) -> bool {
    matches!(self, Self::High | Self::Urgent)
  }
}

/// One device operation as seen by the safety pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
  pub operation_id: String,
  pub device_id: String,
  pub capability: String,
  #[serde(default)]
  pub parameters: HashMap<String, serde_json::Value>,
  pub priority: Priority,
}

/// Per-operation metadata consumed by checkers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyContext {
  pub device_category: DeviceCategory,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user: Option<UserContext>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub medical: Option<MedicalContext>,
  pub emergency_mode: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
}

impl SafetyContext {
  /// Baseline context for a category, without user or medical data.
  pub fn for_category(category: DeviceCategory) -> Self {
    Self {
      device_category: category,
      user: None,
      medical: None,
      emergency_mode: false,
      location: None,
    }
  }

  pub fn with_user(mut self, user: UserContext) -> Self {
    self.user = Some(user);
    self
  }

  pub fn with_medical(mut self, medical: MedicalContext) -> Self {
    self.medical = Some(medical);
    self
  }

  pub fn with_location(mut self, location: impl Into<String>) -> Self {
    self.location = Some(location.into());
    self
  }
}

/// The requesting user and their granted permissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
  pub user_id: String,
  #[serde(default)]
  pub permissions: HashSet<String>,
}

impl UserContext {
  pub fn new(user_id: impl Into<String>, permissions: &[&str]) -> Self {
    Self {
      user_id: user_id.into(),
      permissions: permissions.iter().map(|p| p.to_string()).collect(),
    }
  }

  pub fn has(&self, permission: &str) -> bool {
    self.permissions.contains(permission)
  }
}

/// Medical procedure metadata, present only for medical operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalContext {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub procedure_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub attending_physician: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub patient_id: Option<String>,
}
