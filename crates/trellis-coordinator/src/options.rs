use std::time::Duration;

use trellis_safety::Priority;

/// Per-run knobs for [`crate::ExecutionCoordinator::execute_workflow`].
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
  /// Overall deadline. Defaults to twice the plan's estimated duration.
  pub timeout: Option<Duration>,
  /// Skip the safety pipeline entirely. Intended for dry runs against
  /// simulated devices only.
  pub skip_safety_checks: bool,
  /// Priority attached to every operation request in this run.
  pub priority: Priority,
  /// Base delay for the linear retry backoff (delay = base x attempt
  /// number). Production keeps the 1 s default; tests shrink it.
  pub retry_base_delay: Duration,
}

impl Default for ExecutionOptions {
  fn default() -> Self {
    Self {
      timeout: None,
      skip_safety_checks: false,
      priority: Priority::Normal,
      retry_base_delay: Duration::from_secs(1),
    }
  }
}
