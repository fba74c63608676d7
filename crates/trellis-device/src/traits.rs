use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::command::{DeviceCommand, OperationOutcome};
use crate::error::DeviceError;
use crate::status::DeviceStatus;
use crate::translate::CompiledTemplate;

/// Executes device operations. Implemented by protocol adapters.
///
/// The token is a request, not a guarantee: an implementation that cannot
/// abort mid-flight may let the call run to completion.
#[async_trait]
pub trait DeviceExecutor: Send + Sync {
  async fn execute(
    &self,
    command: &DeviceCommand,
    cancel: &CancellationToken,
  ) -> Result<OperationOutcome, DeviceError>;
}

/// Queries device health. Consumed by the device-state safety checker.
#[async_trait]
pub trait DeviceStatusProvider: Send + Sync {
  async fn status(&self, device_id: &str) -> Result<DeviceStatus, DeviceError>;
}

/// Optional per-operation code template compilation.
pub trait TemplateCompiler: Send + Sync {
  fn compile_template(
    &self,
    template_id: &str,
    parameters: &HashMap<String, serde_json::Value>,
    context: &serde_json::Value,
  ) -> CompiledTemplate;
}
