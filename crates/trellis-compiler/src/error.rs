use thiserror::Error;
use trellis_workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum CompilationError {
  /// Every step failed to compile; the warnings carry the reasons.
  #[error("compilation produced no executable steps ({warning_count} step failure(s))")]
  EmptyPlan { warning_count: usize },

  #[error(transparent)]
  Graph(#[from] WorkflowError),
}
