use serde::{Deserialize, Serialize};

/// Severity of a safety violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Low,
  Medium,
  High,
  Critical,
}

impl std::fmt::Display for Severity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Low => write!(f, "low"),
      Self::Medium => write!(f, "medium"),
      Self::High => write!(f, "high"),
      Self::Critical => write!(f, "critical"),
    }
  }
}

/// A safety-policy failure reported by a checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyViolation {
  pub code: String,
  pub message: String,
  pub severity: Severity,
  /// When true together with `Critical`, the whole execution must stop and
  /// the emergency protocol fires.
  pub emergency_stop_required: bool,
}

impl SafetyViolation {
  pub fn new(
    code: impl Into<String>,
    message: impl Into<String>,
    severity: Severity,
  ) -> Self {
    Self {
      code: code.into(),
      message: message.into(),
      severity,
      emergency_stop_required: false,
    }
  }

  pub fn with_emergency_stop(mut self) -> Self {
    self.emergency_stop_required = true;
    self
  }

  pub fn is_emergency_stop(&self) -> bool {
    self.severity == Severity::Critical && self.emergency_stop_required
  }
}

/// Aggregated outcome of one checker, or of the whole pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyCheckResult {
  pub passed: bool,
  pub violations: Vec<SafetyViolation>,
  pub warnings: Vec<String>,
  pub requires_confirmation: bool,
  pub emergency_protocol_triggered: bool,
}

impl SafetyCheckResult {
  /// A clean pass.
  pub fn pass() -> Self {
    Self {
      passed: true,
      ..Default::default()
    }
  }

  /// Build a result from accumulated parts; `passed` is derived.
  pub fn from_parts(
    violations: Vec<SafetyViolation>,
    warnings: Vec<String>,
    requires_confirmation: bool,
    emergency_protocol_triggered: bool,
  ) -> Self {
    let passed = !violations.iter().any(|v| v.severity == Severity::Critical);
    Self {
      passed,
      violations,
      warnings,
      requires_confirmation,
      emergency_protocol_triggered,
    }
  }

  pub fn has_emergency_stop(&self) -> bool {
    self.violations.iter().any(SafetyViolation::is_emergency_stop)
  }
}
