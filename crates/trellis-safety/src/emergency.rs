//! Emergency protocol handler.
//!
//! Invoked by the pipeline when a critical, stop-required violation occurs,
//! or directly through [`EmergencyHandler::force_emergency_stop`]. The
//! procedure is fixed: stop all operations on the device, drive it to its
//! safe state, notify stakeholders when the category is medical, and write
//! an incident log entry. The action plan is identical for every category;
//! only notification is category-conditional.

use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use trellis_config::DeviceCategory;
use trellis_device::{DeviceCommand, DeviceExecutor};
use trellis_events::{SharedSink, WorkflowEvent};

/// One compensating action within an emergency procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyAction {
  pub sequence: u32,
  pub action: String,
}

/// Record of one executed emergency procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyProcedure {
  pub procedure_id: String,
  pub device_id: String,
  pub reason: String,
  pub actions: Vec<EmergencyAction>,
  pub medical_notification_sent: bool,
}

/// One line in the in-memory incident log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
  pub incident_id: String,
  pub device_id: String,
  pub reason: String,
  pub recorded_at_ms: u64,
}

/// Executes the fixed stop/safe-state/notify/log sequence.
pub struct EmergencyHandler {
  executor: Arc<dyn DeviceExecutor>,
  sink: SharedSink,
  procedures: RwLock<Vec<EmergencyProcedure>>,
  incidents: RwLock<Vec<IncidentRecord>>,
}

impl EmergencyHandler {
  pub fn new(executor: Arc<dyn DeviceExecutor>, sink: SharedSink) -> Self {
    Self {
      executor,
      sink,
      procedures: RwLock::new(Vec::new()),
      incidents: RwLock::new(Vec::new()),
    }
  }

  /// The canonical two-action plan, independent of device category.
  pub fn canonical_plan() -> Vec<EmergencyAction> {
    vec![
      EmergencyAction {
        sequence: 1,
        action: "stop_all".to_string(),
      },
      EmergencyAction {
        sequence: 2,
        action: "set_safe_state".to_string(),
      },
    ]
  }

  /// Handle a stop-required violation raised by the pipeline.
  pub async fn handle(
    &self,
    device_id: &str,
    category: DeviceCategory,
    reason: &str,
  ) -> EmergencyProcedure {
    self.run(device_id, Some(category), reason).await
  }

  /// Force the protocol for a device, outside any validation chain.
  pub async fn force_emergency_stop(&self, device_id: &str, reason: &str) -> EmergencyProcedure {
    self.run(device_id, None, reason).await
  }

  async fn run(
    &self,
    device_id: &str,
    category: Option<DeviceCategory>,
    reason: &str,
  ) -> EmergencyProcedure {
    error!(device_id = %device_id, reason = %reason, "emergency_protocol_started");

    let actions = Self::canonical_plan();
    for action in &actions {
      self.execute_action(device_id, category, &action.action).await;
    }

    let is_medical = category.is_some_and(|c| c.is_medical());
    if is_medical {
      info!(device_id = %device_id, "emergency_stakeholders_notified");
      self.sink.emit(WorkflowEvent::SafetyIncident {
        device_id: device_id.to_string(),
        severity: "critical".to_string(),
        description: reason.to_string(),
      });
    }

    let incident = IncidentRecord {
      incident_id: uuid::Uuid::new_v4().to_string(),
      device_id: device_id.to_string(),
      reason: reason.to_string(),
      recorded_at_ms: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0),
    };
    self.incidents.write().unwrap().push(incident);

    let procedure = EmergencyProcedure {
      procedure_id: uuid::Uuid::new_v4().to_string(),
      device_id: device_id.to_string(),
      reason: reason.to_string(),
      actions,
      medical_notification_sent: is_medical,
    };
    self.procedures.write().unwrap().push(procedure.clone());

    info!(
      device_id = %device_id,
      procedure_id = %procedure.procedure_id,
      "emergency_protocol_completed"
    );

    procedure
  }

  /// Best-effort: an action failure is logged, never escalated.
  async fn execute_action(&self, device_id: &str, category: Option<DeviceCategory>, action: &str) {
    let command = DeviceCommand {
      command_id: uuid::Uuid::new_v4().to_string(),
      execution_id: "emergency".to_string(),
      device_id: device_id.to_string(),
      device_category: category.unwrap_or(DeviceCategory::Personal),
      capability: action.to_string(),
      parameters: Default::default(),
      expected_result: None,
    };

    if let Err(e) = self
      .executor
      .execute(&command, &CancellationToken::new())
      .await
    {
      warn!(
        device_id = %device_id,
        action = %action,
        error = %e,
        "emergency_action_failed"
      );
    }
  }

  /// Executed procedures, newest last.
  pub fn procedures(&self) -> Vec<EmergencyProcedure> {
    self.procedures.read().unwrap().clone()
  }

  /// Incident log entries, newest last.
  pub fn incidents(&self) -> Vec<IncidentRecord> {
    self.incidents.read().unwrap().clone()
  }
}

#[cfg(test)]
mod tests {
  use trellis_device::{SimulatedDevice, SimulatedFleet};
  use trellis_events::NullSink;

  use super::*;

  fn handler(fleet: SimulatedFleet) -> EmergencyHandler {
    EmergencyHandler::new(Arc::new(fleet), Arc::new(NullSink))
  }

  #[tokio::test]
  async fn forced_stop_records_canonical_plan() {
    let fleet = SimulatedFleet::new();
    fleet.insert("pump-1", SimulatedDevice::online(&["stop_all", "set_safe_state"]));
    let handler = handler(fleet);

    let procedure = handler.force_emergency_stop("pump-1", "operator request").await;

    assert_eq!(procedure.actions.len(), 2);
    assert_eq!(procedure.actions[0].sequence, 1);
    assert_eq!(procedure.actions[0].action, "stop_all");
    assert_eq!(procedure.actions[1].sequence, 2);
    assert_eq!(procedure.actions[1].action, "set_safe_state");
    assert!(!procedure.medical_notification_sent);
  }

  #[tokio::test]
  async fn medical_category_notifies_and_logs_incident() {
    let fleet = SimulatedFleet::new();
    fleet.insert("pump-1", SimulatedDevice::online(&["stop_all", "set_safe_state"]));
    let handler = handler(fleet);

    let procedure = handler
      .handle("pump-1", DeviceCategory::Medical, "rate limit exceeded")
      .await;

    assert!(procedure.medical_notification_sent);
    assert_eq!(handler.incidents().len(), 1);
    assert_eq!(handler.procedures().len(), 1);
  }

  #[tokio::test]
  async fn device_failure_does_not_abort_the_procedure() {
    // Unknown device: both actions fail, the procedure still completes.
    let handler = handler(SimulatedFleet::new());
    let procedure = handler.force_emergency_stop("ghost", "test").await;
    assert_eq!(procedure.actions, EmergencyHandler::canonical_plan());
    assert_eq!(handler.incidents().len(), 1);
  }
}
