use thiserror::Error;
use trellis_device::DeviceError;

/// Internal checker failures.
///
/// These never escape the pipeline: each one is downgraded to a synthetic
/// `CHECKER_ERROR` violation on the aggregated result.
#[derive(Debug, Error)]
pub enum SafetyError {
  #[error("device status query failed: {0}")]
  Status(#[from] DeviceError),

  #[error("checker internal error: {0}")]
  Internal(String),
}
