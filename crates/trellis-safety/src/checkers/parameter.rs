use async_trait::async_trait;

use crate::checker::SafetyChecker;
use crate::context::{OperationRequest, Priority, SafetyContext};
use crate::error::SafetyError;
use crate::violation::{SafetyCheckResult, SafetyViolation, Severity};

/// Characters that must never appear in string parameters. These are the
/// usual shell/markup injection suspects.
const DANGEROUS_CHARS: &[char] = &['<', '>', ';', '|', '&', '$', '`', '\\'];

/// Upper bound for rate/dose style medical parameters.
const MEDICAL_PARAM_MAX: f64 = 1000.0;

/// Validates operation parameters: presence, content, and medical ranges.
#[derive(Default)]
pub struct ParameterValidationChecker;

#[async_trait]
impl SafetyChecker for ParameterValidationChecker {
  fn name(&self) -> &'static str {
    "parameter_validation"
  }

  fn priority(&self) -> u8 {
    1
  }

  async fn evaluate(
    &self,
    request: &OperationRequest,
    context: &SafetyContext,
  ) -> Result<SafetyCheckResult, SafetyError> {
    let mut violations = Vec::new();
    let mut warnings = Vec::new();

    for (name, value) in &request.parameters {
      if value.is_null() {
        violations.push(SafetyViolation::new(
          "MISSING_PARAMETER",
          format!("parameter '{name}' is present but has no value"),
          Severity::High,
        ));
      }

      if let Some(s) = value.as_str() {
        if s.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
          violations.push(SafetyViolation::new(
            "DANGEROUS_CHARACTERS",
            format!("parameter '{name}' contains characters from the blocked class"),
            Severity::High,
          ));
        }
      }
    }

    // Medical rate/dose capabilities carry hard numeric bounds.
    let capability = request.capability.to_lowercase();
    if context.device_category.is_medical()
      && (capability.contains("rate") || capability.contains("dose"))
    {
      for (name, value) in &request.parameters {
        if let Some(n) = value.as_f64() {
          if !(0.0..=MEDICAL_PARAM_MAX).contains(&n) {
            violations.push(SafetyViolation::new(
              "MEDICAL_PARAMETER_OUT_OF_RANGE",
              format!(
                "parameter '{name}' = {n} outside [0, {MEDICAL_PARAM_MAX}] for '{}'",
                request.capability
              ),
              Severity::Critical,
            ));
          }
        }
      }
    }

    if request.priority == Priority::Emergency && context.medical.is_none() {
      violations.push(
        SafetyViolation::new(
          "EMERGENCY_WITHOUT_MEDICAL_CONTEXT",
          "emergency-priority request carries no medical context",
          Severity::Critical,
        )
        .with_emergency_stop(),
      );
    }

    if request.parameters.is_empty() {
      warnings.push(format!(
        "operation '{}' was submitted without parameters",
        request.capability
      ));
    }

    Ok(SafetyCheckResult::from_parts(violations, warnings, false, false))
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use trellis_config::DeviceCategory;

  use super::*;

  fn request(capability: &str, params: &[(&str, serde_json::Value)]) -> OperationRequest {
    OperationRequest {
      operation_id: "op-1".into(),
      device_id: "dev-1".into(),
      capability: capability.into(),
      parameters: params
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect(),
      priority: Priority::Normal,
    }
  }

  #[tokio::test]
  async fn clean_parameters_pass() {
    let checker = ParameterValidationChecker;
    let result = checker
      .evaluate(
        &request("power_on", &[("brightness", serde_json::json!(80))]),
        &SafetyContext::for_category(DeviceCategory::Personal),
      )
      .await
      .unwrap();
    assert!(result.passed);
    assert!(result.violations.is_empty());
  }

  #[tokio::test]
  async fn dangerous_characters_flagged() {
    let checker = ParameterValidationChecker;
    let result = checker
      .evaluate(
        &request("rename", &[("label", serde_json::json!("x; rm -rf"))]),
        &SafetyContext::for_category(DeviceCategory::Personal),
      )
      .await
      .unwrap();
    assert_eq!(result.violations[0].code, "DANGEROUS_CHARACTERS");
  }

  #[tokio::test]
  async fn medical_rate_capability_bounds_enforced() {
    let checker = ParameterValidationChecker;
    let result = checker
      .evaluate(
        &request("set_flow_rate", &[("rate", serde_json::json!(1200))]),
        &SafetyContext::for_category(DeviceCategory::Medical),
      )
      .await
      .unwrap();
    assert!(!result.passed);
    assert_eq!(result.violations[0].severity, Severity::Critical);
  }

  #[tokio::test]
  async fn emergency_priority_needs_medical_context() {
    let checker = ParameterValidationChecker;
    let mut req = request("power_off", &[]);
    req.priority = Priority::Emergency;

    let result = checker
      .evaluate(&req, &SafetyContext::for_category(DeviceCategory::Personal))
      .await
      .unwrap();
    assert!(result.has_emergency_stop());
  }

  #[tokio::test]
  async fn null_parameter_is_missing() {
    let checker = ParameterValidationChecker;
    let result = checker
      .evaluate(
        &request("set_temp", &[("target", serde_json::Value::Null)]),
        &SafetyContext::for_category(DeviceCategory::Personal),
      )
      .await
      .unwrap();
    assert_eq!(result.violations[0].code, "MISSING_PARAMETER");
    assert!(result.passed, "high severity alone does not fail the check");
  }
}
