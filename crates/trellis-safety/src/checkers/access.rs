use std::collections::HashSet;

use async_trait::async_trait;

use crate::checker::SafetyChecker;
use crate::context::{OperationRequest, SafetyContext};
use crate::error::SafetyError;
use crate::violation::{SafetyCheckResult, SafetyViolation, Severity};

/// Permissions granting access to specific locations carry this prefix,
/// e.g. `location_access:icu-3`.
const LOCATION_PERMISSION_PREFIX: &str = "location_access:";

/// Verifies the requesting user holds every permission the operation needs.
#[derive(Default)]
pub struct AccessControlChecker;

impl AccessControlChecker {
  /// Permission set derived from the capability name and device category.
  fn required_permissions(request: &OperationRequest, context: &SafetyContext) -> HashSet<String> {
    let mut required = HashSet::from(["device_control".to_string()]);

    let capability = request.capability.to_lowercase();
    if capability.contains("configure") || capability.contains("update") {
      required.insert("device_configuration".to_string());
    }

    if context.device_category.is_medical() {
      required.insert("medical_device_access".to_string());
      required.insert("patient_data_access".to_string());
    }

    required
  }

  fn violation_severity(context: &SafetyContext) -> Severity {
    if context.device_category.is_medical() {
      Severity::Critical
    } else {
      Severity::High
    }
  }
}

#[async_trait]
impl SafetyChecker for AccessControlChecker {
  fn name(&self) -> &'static str {
    "access_control"
  }

  fn priority(&self) -> u8 {
    2
  }

  async fn evaluate(
    &self,
    request: &OperationRequest,
    context: &SafetyContext,
  ) -> Result<SafetyCheckResult, SafetyError> {
    let mut violations = Vec::new();

    let Some(user) = &context.user else {
      violations.push(SafetyViolation::new(
        "NO_USER_CONTEXT",
        "operation submitted without a user context",
        Self::violation_severity(context),
      ));
      return Ok(SafetyCheckResult::from_parts(violations, vec![], false, false));
    };

    for permission in Self::required_permissions(request, context) {
      if !user.has(&permission) {
        violations.push(SafetyViolation::new(
          "MISSING_PERMISSION",
          format!("user '{}' lacks permission '{permission}'", user.user_id),
          Self::violation_severity(context),
        ));
      }
    }

    // Medical operations tied to a location must match the user's
    // location-access grants.
    if context.device_category.is_medical() {
      if let Some(location) = &context.location {
        let allowed: HashSet<&str> = user
          .permissions
          .iter()
          .filter_map(|p| p.strip_prefix(LOCATION_PERMISSION_PREFIX))
          .collect();
        if !allowed.contains(location.as_str()) {
          violations.push(SafetyViolation::new(
            "LOCATION_NOT_AUTHORIZED",
            format!(
              "user '{}' is not authorized for location '{location}'",
              user.user_id
            ),
            Severity::Critical,
          ));
        }
      }
    }

    if context.emergency_mode
      && context.device_category.is_medical()
      && context.medical.is_none()
    {
      violations.push(SafetyViolation::new(
        "EMERGENCY_ACCESS_WITHOUT_MEDICAL_CONTEXT",
        "emergency-mode medical request carries no medical context",
        Severity::Critical,
      ));
    }

    Ok(SafetyCheckResult::from_parts(violations, vec![], false, false))
  }
}
