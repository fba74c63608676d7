//! The safety validation pipeline.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use trellis_device::DeviceStatusProvider;
use trellis_events::{SharedSink, WorkflowEvent};

use crate::checker::SafetyChecker;
use crate::checkers::{
  AccessControlChecker, DeviceStateChecker, MedicalOverrideChecker, ParameterValidationChecker,
  RateLimitChecker,
};
use crate::context::{OperationRequest, SafetyContext};
use crate::emergency::EmergencyHandler;
use crate::violation::{SafetyCheckResult, SafetyViolation, Severity};

/// Orchestrates the checkers in priority order and aggregates their results.
///
/// Processing stops as soon as the accumulated violations contain one that is
/// critical and requires an emergency stop; the emergency handler is then
/// invoked exactly once for the chain.
pub struct SafetyPipeline {
  checkers: Vec<Arc<dyn SafetyChecker>>,
  emergency: Arc<EmergencyHandler>,
  sink: SharedSink,
}

impl SafetyPipeline {
  /// Build the standard pipeline: parameter validation, access control,
  /// medical override, rate limiting, device state.
  pub fn new(
    status_provider: Arc<dyn DeviceStatusProvider>,
    emergency: Arc<EmergencyHandler>,
    sink: SharedSink,
  ) -> Self {
    let checkers: Vec<Arc<dyn SafetyChecker>> = vec![
      Arc::new(ParameterValidationChecker),
      Arc::new(AccessControlChecker),
      Arc::new(MedicalOverrideChecker),
      Arc::new(RateLimitChecker::new()),
      Arc::new(DeviceStateChecker::new(status_provider)),
    ];
    Self::with_checkers(checkers, emergency, sink)
  }

  /// Build a pipeline from an explicit checker set. Order is normalized by
  /// ascending priority so registration order cannot matter.
  pub fn with_checkers(
    mut checkers: Vec<Arc<dyn SafetyChecker>>,
    emergency: Arc<EmergencyHandler>,
    sink: SharedSink,
  ) -> Self {
    checkers.sort_by_key(|c| c.priority());
    Self {
      checkers,
      emergency,
      sink,
    }
  }

  /// Checker names in execution order.
  pub fn checker_names(&self) -> Vec<&'static str> {
    self.checkers.iter().map(|c| c.name()).collect()
  }

  /// Handle for direct emergency invocations (e.g. a forced stop).
  pub fn emergency_handler(&self) -> &Arc<EmergencyHandler> {
    &self.emergency
  }

  /// Run every applicable checker against the request.
  #[instrument(
    name = "safety_validate",
    skip(self, request, context),
    fields(operation_id = %request.operation_id, device_id = %request.device_id)
  )]
  pub async fn validate(
    &self,
    request: &OperationRequest,
    context: &SafetyContext,
  ) -> SafetyCheckResult {
    let mut violations: Vec<SafetyViolation> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut requires_confirmation = false;
    let mut emergency_protocol_triggered = false;

    for checker in &self.checkers {
      match checker.evaluate(request, context).await {
        Ok(result) => {
          violations.extend(result.violations);
          warnings.extend(result.warnings);
          requires_confirmation |= result.requires_confirmation;
          emergency_protocol_triggered |= result.emergency_protocol_triggered;
        }
        Err(e) => {
          warn!(
            checker = checker.name(),
            error = %e,
            "checker_error_downgraded"
          );
          violations.push(SafetyViolation::new(
            "CHECKER_ERROR",
            format!("checker '{}' failed internally: {e}", checker.name()),
            Severity::High,
          ));
        }
      }

      if violations.iter().any(SafetyViolation::is_emergency_stop) {
        warn!(
          checker = checker.name(),
          "critical stop-required violation, aborting checker chain"
        );
        break;
      }
    }

    let stop_required = violations.iter().any(SafetyViolation::is_emergency_stop);
    if stop_required {
      // Exactly one handler invocation per violation chain.
      let reason = violations
        .iter()
        .find(|v| v.is_emergency_stop())
        .map(|v| v.message.clone())
        .unwrap_or_else(|| "emergency stop required".to_string());
      self
        .emergency
        .handle(&request.device_id, context.device_category, &reason)
        .await;
      emergency_protocol_triggered = true;
    }

    let result = SafetyCheckResult::from_parts(
      violations,
      warnings,
      requires_confirmation,
      emergency_protocol_triggered,
    );

    if result.passed {
      info!(
        operation_id = %request.operation_id,
        violation_count = result.violations.len(),
        warning_count = result.warnings.len(),
        "safety_validation_passed"
      );
    } else {
      warn!(
        operation_id = %request.operation_id,
        violation_count = result.violations.len(),
        warning_count = result.warnings.len(),
        "safety_validation_failed"
      );
      let severity = result
        .violations
        .iter()
        .map(|v| v.severity)
        .max()
        .unwrap_or(Severity::Low);
      self.sink.emit(WorkflowEvent::SafetyIncident {
        device_id: request.device_id.clone(),
        severity: severity.to_string(),
        description: format!(
          "operation '{}' rejected with {} violation(s)",
          request.capability,
          result.violations.len()
        ),
      });
    }

    result
  }
}
