//! In-memory device fleet for the CLI and for tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::command::{DeviceCommand, OperationMetrics, OperationOutcome};
use crate::error::DeviceError;
use crate::status::DeviceStatus;
use crate::traits::{DeviceExecutor, DeviceStatusProvider};

/// A single simulated device.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
  pub status: DeviceStatus,
  /// Operations fail until this many attempts have been consumed.
  pub failures_remaining: u32,
  /// Artificial latency per operation.
  pub latency: Duration,
}

impl SimulatedDevice {
  pub fn online(capabilities: &[&str]) -> Self {
    Self {
      status: DeviceStatus {
        is_online: true,
        battery_level: Some(100),
        supported_capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
      },
      failures_remaining: 0,
      latency: Duration::ZERO,
    }
  }

  pub fn with_battery(mut self, level: u8) -> Self {
    self.status.battery_level = Some(level);
    self
  }

  pub fn offline(mut self) -> Self {
    self.status.is_online = false;
    self
  }

  pub fn failing(mut self, times: u32) -> Self {
    self.failures_remaining = times;
    self
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }
}

/// A fleet of simulated devices implementing both collaborator traits.
#[derive(Clone, Default)]
pub struct SimulatedFleet {
  devices: Arc<RwLock<HashMap<String, SimulatedDevice>>>,
}

impl SimulatedFleet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, device_id: impl Into<String>, device: SimulatedDevice) {
    self.devices.write().unwrap().insert(device_id.into(), device);
  }

  fn device(&self, device_id: &str) -> Result<SimulatedDevice, DeviceError> {
    self
      .devices
      .read()
      .unwrap()
      .get(device_id)
      .cloned()
      .ok_or_else(|| DeviceError::NotFound(device_id.to_string()))
  }

  /// Consume one pending failure for the device, if any.
  fn take_failure(&self, device_id: &str) -> bool {
    let mut devices = self.devices.write().unwrap();
    match devices.get_mut(device_id) {
      Some(d) if d.failures_remaining > 0 => {
        d.failures_remaining -= 1;
        true
      }
      _ => false,
    }
  }
}

#[async_trait]
impl DeviceExecutor for SimulatedFleet {
  async fn execute(
    &self,
    command: &DeviceCommand,
    cancel: &CancellationToken,
  ) -> Result<OperationOutcome, DeviceError> {
    let device = self.device(&command.device_id)?;

    if !device.status.is_online {
      return Err(DeviceError::Offline(command.device_id.clone()));
    }

    if !device.latency.is_zero() {
      tokio::select! {
        _ = tokio::time::sleep(device.latency) => {}
        _ = cancel.cancelled() => return Err(DeviceError::Cancelled),
      }
    }

    if self.take_failure(&command.device_id) {
      return Err(DeviceError::OperationFailed {
        device_id: command.device_id.clone(),
        message: format!("simulated failure for '{}'", command.capability),
      });
    }

    info!(
      device_id = %command.device_id,
      capability = %command.capability,
      "simulated_operation_executed"
    );

    Ok(OperationOutcome {
      result: serde_json::json!({
        "device_id": command.device_id,
        "capability": command.capability,
        "status": "ok",
      }),
      metrics: OperationMetrics {
        safety_compliant: true,
        duration_ms: Some(device.latency.as_millis() as u64),
      },
    })
  }
}

#[async_trait]
impl DeviceStatusProvider for SimulatedFleet {
  async fn status(&self, device_id: &str) -> Result<DeviceStatus, DeviceError> {
    Ok(self.device(device_id)?.status)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use trellis_config::DeviceCategory;

  fn command(device_id: &str, capability: &str) -> DeviceCommand {
    DeviceCommand {
      command_id: "cmd-1".into(),
      execution_id: "exec-1".into(),
      device_id: device_id.into(),
      device_category: DeviceCategory::Personal,
      capability: capability.into(),
      parameters: HashMap::new(),
      expected_result: None,
    }
  }

  #[tokio::test]
  async fn executes_against_online_device() {
    let fleet = SimulatedFleet::new();
    fleet.insert("lamp", SimulatedDevice::online(&["power_on"]));

    let outcome = fleet
      .execute(&command("lamp", "power_on"), &CancellationToken::new())
      .await
      .expect("operation should succeed");
    assert!(outcome.metrics.safety_compliant);
  }

  #[tokio::test]
  async fn offline_device_rejects_operations() {
    let fleet = SimulatedFleet::new();
    fleet.insert("pump", SimulatedDevice::online(&["infuse"]).offline());

    let err = fleet
      .execute(&command("pump", "infuse"), &CancellationToken::new())
      .await
      .unwrap_err();
    assert!(matches!(err, DeviceError::Offline(_)));
  }

  #[tokio::test]
  async fn failures_are_consumed_in_order() {
    let fleet = SimulatedFleet::new();
    fleet.insert("valve", SimulatedDevice::online(&["open"]).failing(1));

    let cancel = CancellationToken::new();
    assert!(fleet.execute(&command("valve", "open"), &cancel).await.is_err());
    assert!(fleet.execute(&command("valve", "open"), &cancel).await.is_ok());
  }
}
