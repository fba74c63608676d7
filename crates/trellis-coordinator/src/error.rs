use thiserror::Error;

/// Misuse of the coordinator's registry surface.
///
/// Execution failures never appear here: they are attached to the
/// [`crate::WorkflowExecution`] as a structured [`crate::ExecutionFailure`].
#[derive(Debug, Error)]
pub enum CoordinatorError {
  #[error("execution '{0}' not found")]
  ExecutionNotFound(String),

  #[error("execution '{execution_id}' is not running (status: {status})")]
  NotRunning {
    execution_id: String,
    status: String,
  },

  #[error("execution '{0}' is still running and cannot be evicted")]
  StillRunning(String),

  #[error("plan '{0}' not found in the cache")]
  PlanNotFound(String),
}
