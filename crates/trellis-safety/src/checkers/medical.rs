use async_trait::async_trait;

use crate::checker::SafetyChecker;
use crate::context::{OperationRequest, Priority, SafetyContext};
use crate::error::SafetyError;
use crate::violation::{SafetyCheckResult, SafetyViolation, Severity};

/// Procedure types that require an explicit supervision grant.
const HIGH_RISK_PROCEDURES: &[&str] = &["surgery", "anesthesia", "critical_care"];

/// Hard clinical limits on named parameters.
const MAX_RATE: f64 = 100.0;
const MAX_DOSE: f64 = 500.0;

/// Medical-specific overrides. A no-op for non-medical categories.
#[derive(Default)]
pub struct MedicalOverrideChecker;

#[async_trait]
impl SafetyChecker for MedicalOverrideChecker {
  fn name(&self) -> &'static str {
    "medical_override"
  }

  fn priority(&self) -> u8 {
    3
  }

  async fn evaluate(
    &self,
    request: &OperationRequest,
    context: &SafetyContext,
  ) -> Result<SafetyCheckResult, SafetyError> {
    if !context.device_category.is_medical() {
      return Ok(SafetyCheckResult::pass());
    }

    let mut violations = Vec::new();
    let mut warnings = Vec::new();
    let mut emergency_protocol_triggered = false;

    if request.priority == Priority::Emergency || context.emergency_mode {
      emergency_protocol_triggered = true;
      warnings.push(format!(
        "emergency protocol active for operation '{}' on device '{}'",
        request.capability, request.device_id
      ));
    }

    if let Some(medical) = &context.medical {
      if let Some(procedure) = &medical.procedure_type {
        if HIGH_RISK_PROCEDURES.contains(&procedure.as_str()) {
          let supervised = context
            .user
            .as_ref()
            .is_some_and(|u| u.has("medical_supervision"));
          if !supervised {
            violations.push(SafetyViolation::new(
              "UNSUPERVISED_HIGH_RISK_PROCEDURE",
              format!("procedure '{procedure}' requires the medical_supervision permission"),
              Severity::Critical,
            ));
          }
        }
      }
    }

    for (name, value) in &request.parameters {
      let Some(n) = value.as_f64() else { continue };
      let lower = name.to_lowercase();
      let exceeded = (lower.contains("rate") && n > MAX_RATE)
        || (lower.contains("dose") && n > MAX_DOSE);
      if exceeded {
        violations.push(
          SafetyViolation::new(
            "MEDICAL_LIMIT_EXCEEDED",
            format!("parameter '{name}' = {n} exceeds the clinical limit"),
            Severity::Critical,
          )
          .with_emergency_stop(),
        );
      }
    }

    if request.priority == Priority::Emergency {
      let has_physician = context
        .medical
        .as_ref()
        .is_some_and(|m| m.attending_physician.is_some());
      if !has_physician {
        violations.push(SafetyViolation::new(
          "NO_ATTENDING_PHYSICIAN",
          "emergency urgency without an assigned attending physician",
          Severity::Critical,
        ));
      }
    }

    Ok(SafetyCheckResult::from_parts(
      violations,
      warnings,
      false,
      emergency_protocol_triggered,
    ))
  }
}

#[cfg(test)]
mod tests {
  use trellis_config::DeviceCategory;

  use super::*;
  use crate::context::{MedicalContext, UserContext};

  fn request(params: &[(&str, f64)]) -> OperationRequest {
    OperationRequest {
      operation_id: "op-1".into(),
      device_id: "pump-1".into(),
      capability: "infuse".into(),
      parameters: params
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
        .collect(),
      priority: Priority::Normal,
    }
  }

  #[tokio::test]
  async fn non_medical_is_a_no_op() {
    let checker = MedicalOverrideChecker;
    let result = checker
      .evaluate(
        &request(&[("rate", 9999.0)]),
        &SafetyContext::for_category(DeviceCategory::Industrial),
      )
      .await
      .unwrap();
    assert!(result.passed);
    assert!(result.violations.is_empty());
  }

  #[tokio::test]
  async fn rate_over_limit_forces_emergency_stop() {
    let checker = MedicalOverrideChecker;
    let result = checker
      .evaluate(
        &request(&[("flow_rate", 150.0)]),
        &SafetyContext::for_category(DeviceCategory::Medical),
      )
      .await
      .unwrap();
    assert!(result.has_emergency_stop());
    assert!(!result.emergency_protocol_triggered);
  }

  #[tokio::test]
  async fn dose_within_limit_passes() {
    let checker = MedicalOverrideChecker;
    let result = checker
      .evaluate(
        &request(&[("dose", 400.0)]),
        &SafetyContext::for_category(DeviceCategory::Medical),
      )
      .await
      .unwrap();
    assert!(result.passed);
  }

  #[tokio::test]
  async fn high_risk_procedure_requires_supervision() {
    let checker = MedicalOverrideChecker;
    let context = SafetyContext::for_category(DeviceCategory::Medical)
      .with_user(UserContext::new("nurse-1", &["medical_device_access"]))
      .with_medical(MedicalContext {
        procedure_type: Some("anesthesia".into()),
        ..Default::default()
      });

    let result = checker.evaluate(&request(&[]), &context).await.unwrap();
    assert_eq!(result.violations[0].code, "UNSUPERVISED_HIGH_RISK_PROCEDURE");
  }

  #[tokio::test]
  async fn emergency_priority_triggers_protocol_and_needs_physician() {
    let checker = MedicalOverrideChecker;
    let mut req = request(&[]);
    req.priority = Priority::Emergency;

    let context = SafetyContext::for_category(DeviceCategory::Medical);
    let result = checker.evaluate(&req, &context).await.unwrap();
    assert!(result.emergency_protocol_triggered);
    assert!(
      result
        .violations
        .iter()
        .any(|v| v.code == "NO_ATTENDING_PHYSICIAN")
    );

    let with_physician = context.with_medical(MedicalContext {
      attending_physician: Some("dr-lee".into()),
      ..Default::default()
    });
    let result = checker.evaluate(&req, &with_physician).await.unwrap();
    assert!(result.violations.is_empty());
  }
}
