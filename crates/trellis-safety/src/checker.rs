use async_trait::async_trait;

use crate::context::{OperationRequest, SafetyContext};
use crate::error::SafetyError;
use crate::violation::SafetyCheckResult;

/// An independent safety policy evaluator.
///
/// Checkers are stateless per call (the rate limiter carries a window map but
/// every evaluation is self-contained) and must never panic: internal
/// failures are returned as [`SafetyError`] and downgraded by the pipeline.
#[async_trait]
pub trait SafetyChecker: Send + Sync {
  /// Stable snake_case identifier, used in logs and checker-order tests.
  fn name(&self) -> &'static str;

  /// Position in the pipeline; lower runs first.
  fn priority(&self) -> u8;

  async fn evaluate(
    &self,
    request: &OperationRequest,
    context: &SafetyContext,
  ) -> Result<SafetyCheckResult, SafetyError>;
}
