use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::checker::SafetyChecker;
use crate::context::{OperationRequest, SafetyContext};
use crate::error::SafetyError;
use crate::violation::{SafetyCheckResult, SafetyViolation, Severity};

const WINDOW: Duration = Duration::from_secs(60);

const MEDICAL_LIMIT: usize = 10;
const ELEVATED_LIMIT: usize = 20;
const DEFAULT_LIMIT: usize = 30;

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct RateKey {
  user_id: String,
  device_id: String,
  capability: String,
}

/// Sliding-window rate limiting keyed by (user, device, capability).
///
/// The window map is process-wide because the pipeline holding this checker
/// is shared across executions. Expired entries are purged lazily on each
/// call; nothing else writes the map.
pub struct RateLimitChecker {
  windows: Mutex<HashMap<RateKey, Vec<Instant>>>,
}

impl RateLimitChecker {
  pub fn new() -> Self {
    Self {
      windows: Mutex::new(HashMap::new()),
    }
  }

  fn limit_for(request: &OperationRequest, context: &SafetyContext) -> usize {
    if context.device_category.is_medical() {
      MEDICAL_LIMIT
    } else if request.priority.is_elevated() {
      ELEVATED_LIMIT
    } else {
      DEFAULT_LIMIT
    }
  }
}

impl Default for RateLimitChecker {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl SafetyChecker for RateLimitChecker {
  fn name(&self) -> &'static str {
    "rate_limiting"
  }

  fn priority(&self) -> u8 {
    4
  }

  async fn evaluate(
    &self,
    request: &OperationRequest,
    context: &SafetyContext,
  ) -> Result<SafetyCheckResult, SafetyError> {
    let user_id = context
      .user
      .as_ref()
      .map(|u| u.user_id.clone())
      .unwrap_or_else(|| "anonymous".to_string());

    let key = RateKey {
      user_id,
      device_id: request.device_id.clone(),
      capability: request.capability.clone(),
    };
    let limit = Self::limit_for(request, context);
    let now = Instant::now();

    let mut windows = self
      .windows
      .lock()
      .map_err(|_| SafetyError::Internal("rate window lock poisoned".into()))?;

    // Lazy purge: drop expired entries across the whole map.
    windows.retain(|_, calls| {
      calls.retain(|t| now.duration_since(*t) < WINDOW);
      !calls.is_empty()
    });

    let calls = windows.entry(key).or_default();
    calls.push(now);

    if calls.len() > limit {
      let violation = SafetyViolation::new(
        "RATE_LIMIT_EXCEEDED",
        format!(
          "call {} of '{}' on device '{}' exceeds the limit of {limit} per 60s",
          calls.len(),
          request.capability,
          request.device_id
        ),
        Severity::Medium,
      );
      return Ok(SafetyCheckResult::from_parts(vec![violation], vec![], false, false));
    }

    Ok(SafetyCheckResult::pass())
  }
}

#[cfg(test)]
mod tests {
  use trellis_config::DeviceCategory;

  use super::*;
  use crate::context::{Priority, UserContext};

  fn request(priority: Priority) -> OperationRequest {
    OperationRequest {
      operation_id: "op-1".into(),
      device_id: "pump-1".into(),
      capability: "infuse".into(),
      parameters: Default::default(),
      priority,
    }
  }

  fn context(category: DeviceCategory) -> SafetyContext {
    SafetyContext::for_category(category).with_user(UserContext::new("user-1", &[]))
  }

  #[tokio::test]
  async fn eleventh_medical_call_is_limited() {
    let checker = RateLimitChecker::new();
    let req = request(Priority::Normal);
    let ctx = context(DeviceCategory::Medical);

    for call in 1..=10 {
      let result = checker.evaluate(&req, &ctx).await.unwrap();
      assert!(result.passed, "call {call} should pass");
      assert!(result.violations.is_empty());
    }

    let result = checker.evaluate(&req, &ctx).await.unwrap();
    assert_eq!(result.violations[0].code, "RATE_LIMIT_EXCEEDED");
    assert_eq!(result.violations[0].severity, Severity::Medium);
    // Medium does not abort the chain or fail the check outright.
    assert!(result.passed);
  }

  #[tokio::test]
  async fn keys_are_isolated_per_device() {
    let checker = RateLimitChecker::new();
    let ctx = context(DeviceCategory::Medical);

    for _ in 0..10 {
      checker.evaluate(&request(Priority::Normal), &ctx).await.unwrap();
    }

    let mut other = request(Priority::Normal);
    other.device_id = "pump-2".into();
    let result = checker.evaluate(&other, &ctx).await.unwrap();
    assert!(result.violations.is_empty());
  }

  #[tokio::test]
  async fn elevated_priority_gets_higher_limit() {
    let checker = RateLimitChecker::new();
    let ctx = context(DeviceCategory::Personal);
    let req = request(Priority::Urgent);

    for _ in 0..20 {
      let result = checker.evaluate(&req, &ctx).await.unwrap();
      assert!(result.violations.is_empty());
    }
    let result = checker.evaluate(&req, &ctx).await.unwrap();
    assert_eq!(result.violations.len(), 1);
  }
}
