use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trellis_config::DeviceCategory;
use trellis_safety::SafetyContext;

/// The executable artifact derived from a workflow. Immutable once built;
/// recompiling the same workflow yields the same shape under a new plan id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPlan {
  pub plan_id: String,
  pub workflow_id: String,
  pub steps: Vec<ExecutionStep>,
  /// Step ids in topological order, computed once at compile time.
  pub order: Vec<String>,
  pub warnings: Vec<CompileWarning>,
  pub estimated_duration: Duration,
}

impl CompiledPlan {
  pub fn get_step(&self, step_id: &str) -> Option<&ExecutionStep> {
    self.steps.iter().find(|s| s.step_id == step_id)
  }
}

/// Compilation unit corresponding to one workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
  /// Deterministic per node (`step-<node id>`), so dependency sets survive
  /// recompilation unchanged.
  pub step_id: String,
  pub node_id: u64,
  pub device_operations: Vec<DeviceOperationSequence>,
  /// Step ids this step waits for.
  pub dependencies: Vec<String>,
  /// Checker tags that gate this step's operations.
  pub safety_checks: Vec<String>,
  /// Compensating operations, run best-effort after a failure.
  pub rollback_plan: Vec<DeviceOperation>,
}

/// Ordered operations against a single device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceOperationSequence {
  pub device_id: String,
  pub device_category: DeviceCategory,
  pub operations: Vec<DeviceOperation>,
  /// Category-derived baseline; the coordinator attaches the requesting
  /// user before validation.
  pub safety_context: SafetyContext,
  pub timeout: Duration,
  pub retry_count: u32,
}

/// One capability invocation with parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceOperation {
  pub sequence: u32,
  pub capability: String,
  #[serde(default)]
  pub parameters: HashMap<String, serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expected_result: Option<serde_json::Value>,
}

/// A non-fatal, per-step compilation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileWarning {
  pub node_id: u64,
  pub message: String,
}
