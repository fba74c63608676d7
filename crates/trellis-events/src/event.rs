use serde::{Deserialize, Serialize};

/// A lifecycle notification emitted by the parser, compiler, or coordinator.
///
/// Events are observable side effects only: nothing in the core reads them
/// back, and no persistence is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
  WorkflowParsed {
    workflow_id: String,
    node_count: usize,
    complexity: u32,
  },
  CompilationStarted {
    workflow_id: String,
  },
  CompilationCompleted {
    workflow_id: String,
    plan_id: String,
    step_count: usize,
    warning_count: usize,
  },
  CompilationFailed {
    workflow_id: String,
    reason: String,
  },
  ExecutionStarted {
    execution_id: String,
    plan_id: String,
  },
  ExecutionCompleted {
    execution_id: String,
  },
  ExecutionFailed {
    execution_id: String,
    code: String,
    message: String,
  },
  ExecutionCancelled {
    execution_id: String,
    reason: String,
  },
  StepStarted {
    execution_id: String,
    step_id: String,
  },
  StepCompleted {
    execution_id: String,
    step_id: String,
  },
  StepFailed {
    execution_id: String,
    step_id: String,
    reason: String,
  },
  ProgressUpdate {
    execution_id: String,
    progress: u8,
  },
  DeviceOperationCompleted {
    execution_id: String,
    device_id: String,
    capability: String,
  },
  SafetyIncident {
    device_id: String,
    severity: String,
    description: String,
  },
}

impl WorkflowEvent {
  /// Stable snake_case name, used for log records.
  pub fn name(&self) -> &'static str {
    match self {
      Self::WorkflowParsed { .. } => "workflow_parsed",
      Self::CompilationStarted { .. } => "compilation_started",
      Self::CompilationCompleted { .. } => "compilation_completed",
      Self::CompilationFailed { .. } => "compilation_failed",
      Self::ExecutionStarted { .. } => "execution_started",
      Self::ExecutionCompleted { .. } => "execution_completed",
      Self::ExecutionFailed { .. } => "execution_failed",
      Self::ExecutionCancelled { .. } => "execution_cancelled",
      Self::StepStarted { .. } => "step_started",
      Self::StepCompleted { .. } => "step_completed",
      Self::StepFailed { .. } => "step_failed",
      Self::ProgressUpdate { .. } => "progress_update",
      Self::DeviceOperationCompleted { .. } => "device_operation_completed",
      Self::SafetyIncident { .. } => "safety_incident",
    }
  }
}
