use std::sync::Arc;

use async_trait::async_trait;
use trellis_device::DeviceStatusProvider;

use crate::checker::SafetyChecker;
use crate::context::{OperationRequest, SafetyContext};
use crate::error::SafetyError;
use crate::violation::{SafetyCheckResult, SafetyViolation, Severity};

const LOW_BATTERY_THRESHOLD: u8 = 20;

/// Queries live device health before an operation is allowed through.
pub struct DeviceStateChecker {
  status_provider: Arc<dyn DeviceStatusProvider>,
}

impl DeviceStateChecker {
  pub fn new(status_provider: Arc<dyn DeviceStatusProvider>) -> Self {
    Self { status_provider }
  }
}

#[async_trait]
impl SafetyChecker for DeviceStateChecker {
  fn name(&self) -> &'static str {
    "device_state"
  }

  fn priority(&self) -> u8 {
    5
  }

  async fn evaluate(
    &self,
    request: &OperationRequest,
    context: &SafetyContext,
  ) -> Result<SafetyCheckResult, SafetyError> {
    let status = self.status_provider.status(&request.device_id).await?;

    let mut violations = Vec::new();

    if !status.is_online {
      violations.push(SafetyViolation::new(
        "DEVICE_OFFLINE",
        format!("device '{}' is offline", request.device_id),
        Severity::High,
      ));
    }

    if let Some(level) = status.battery_level {
      if level < LOW_BATTERY_THRESHOLD {
        let severity = if context.device_category.is_medical() {
          Severity::Critical
        } else {
          Severity::Medium
        };
        violations.push(SafetyViolation::new(
          "LOW_BATTERY",
          format!("device '{}' battery at {level}%", request.device_id),
          severity,
        ));
      }
    }

    if !status.supports(&request.capability) {
      violations.push(SafetyViolation::new(
        "CAPABILITY_NOT_SUPPORTED",
        format!(
          "device '{}' does not support capability '{}'",
          request.device_id, request.capability
        ),
        Severity::High,
      ));
    }

    Ok(SafetyCheckResult::from_parts(violations, vec![], false, false))
  }
}
