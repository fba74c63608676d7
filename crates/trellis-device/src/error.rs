use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
  #[error("device '{0}' not found")]
  NotFound(String),

  #[error("device '{0}' is offline")]
  Offline(String),

  #[error("device '{device_id}' does not support capability '{capability}'")]
  UnsupportedCapability {
    device_id: String,
    capability: String,
  },

  #[error("operation failed on device '{device_id}': {message}")]
  OperationFailed { device_id: String, message: String },

  #[error("operation cancelled")]
  Cancelled,
}
