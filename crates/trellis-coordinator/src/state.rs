use serde::{Deserialize, Serialize};
use trellis_safety::{SafetyCheckResult, Severity};

/// Terminal-once status of a whole execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Running,
  Completed,
  Failed,
  Cancelled,
}

impl ExecutionStatus {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, Self::Running)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Retrying,
  Cancelled,
}

impl OperationStatus {
  /// Statuses flipped to `Cancelled` by a cooperative cancel.
  pub fn is_in_flight(&self) -> bool {
    matches!(self, Self::Running | Self::Retrying)
  }
}

/// One run of a compiled plan. Mutated throughout execution, terminal
/// exactly once, retained for inspection until evicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
  pub execution_id: String,
  pub plan_id: String,
  pub status: ExecutionStatus,
  /// 0-100, completed steps over total steps.
  pub progress: u8,
  pub steps: Vec<StepExecution>,
  pub results: Vec<StepResult>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<ExecutionFailure>,
}

impl WorkflowExecution {
  pub fn step(&self, step_id: &str) -> Option<&StepExecution> {
    self.steps.iter().find(|s| s.step_id == step_id)
  }

  pub(crate) fn step_mut(&mut self, step_id: &str) -> Option<&mut StepExecution> {
    self.steps.iter_mut().find(|s| s.step_id == step_id)
  }

  pub(crate) fn recompute_progress(&mut self) {
    let total = self.steps.len();
    if total == 0 {
      self.progress = 100;
      return;
    }
    let completed = self
      .steps
      .iter()
      .filter(|s| s.status == StepStatus::Completed)
      .count();
    self.progress = ((completed * 100) / total) as u8;
  }
}

/// Per-step bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
  pub step_id: String,
  pub status: StepStatus,
  pub operations: Vec<OperationExecution>,
  pub safety_results: Vec<SafetyCheckResult>,
  /// Non-fatal safety violations surface here instead of failing the step.
  pub warnings: Vec<String>,
}

impl StepExecution {
  pub fn pending(step_id: impl Into<String>) -> Self {
    Self {
      step_id: step_id.into(),
      status: StepStatus::Pending,
      operations: Vec::new(),
      safety_results: Vec::new(),
      warnings: Vec::new(),
    }
  }
}

/// Per-operation bookkeeping. `retry_attempt` never exceeds the sequence's
/// retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationExecution {
  pub operation_id: String,
  pub capability: String,
  pub status: OperationStatus,
  pub retry_attempt: u32,
}

/// Output captured from a completed device operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
  pub step_id: String,
  pub device_id: String,
  pub capability: String,
  pub output: serde_json::Value,
}

/// The structured terminal error attached to a failed execution. No raw
/// error type crosses the coordinator's public boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFailure {
  pub code: String,
  pub message: String,
  pub severity: Severity,
  pub recoverable: bool,
}

impl ExecutionFailure {
  pub fn new(
    code: impl Into<String>,
    message: impl Into<String>,
    severity: Severity,
    recoverable: bool,
  ) -> Self {
    Self {
      code: code.into(),
      message: message.into(),
      severity,
      recoverable,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn progress_tracks_completed_steps() {
    let mut execution = WorkflowExecution {
      execution_id: "e".into(),
      plan_id: "p".into(),
      status: ExecutionStatus::Running,
      progress: 0,
      steps: vec![
        StepExecution::pending("step-1"),
        StepExecution::pending("step-2"),
        StepExecution::pending("step-3"),
      ],
      results: Vec::new(),
      error: None,
    };

    execution.steps[0].status = StepStatus::Completed;
    execution.recompute_progress();
    assert_eq!(execution.progress, 33);

    execution.steps[1].status = StepStatus::Completed;
    execution.steps[2].status = StepStatus::Completed;
    execution.recompute_progress();
    assert_eq!(execution.progress, 100);
  }

  #[test]
  fn terminal_statuses() {
    assert!(!ExecutionStatus::Running.is_terminal());
    assert!(ExecutionStatus::Completed.is_terminal());
    assert!(ExecutionStatus::Failed.is_terminal());
    assert!(ExecutionStatus::Cancelled.is_terminal());
  }
}
