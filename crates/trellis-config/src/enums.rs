use serde::{Deserialize, Serialize};

/// Category of the devices a workflow drives.
///
/// Medical workflows get a tighter safety context from the compiler: higher
/// operation risk, shorter timeouts, and a smaller retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
  Personal,
  Medical,
  Industrial,
}

impl DeviceCategory {
  pub fn is_medical(&self) -> bool {
    matches!(self, Self::Medical)
  }
}

impl std::fmt::Display for DeviceCategory {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Personal => write!(f, "personal"),
      Self::Medical => write!(f, "medical"),
      Self::Industrial => write!(f, "industrial"),
    }
  }
}

/// Safety level declared by the editor for the whole workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
  Low,
  Medium,
  High,
  Critical,
}

impl std::fmt::Display for SafetyLevel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Low => write!(f, "low"),
      Self::Medium => write!(f, "medium"),
      Self::High => write!(f, "high"),
      Self::Critical => write!(f, "critical"),
    }
  }
}
