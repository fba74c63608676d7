//! Trellis Safety
//!
//! The safety validation pipeline that gates every device operation, and the
//! emergency protocol handler it arms.
//!
//! Checkers are independent, stateless-per-call policy evaluators behind the
//! [`SafetyChecker`] trait. The pipeline holds them in a static,
//! priority-ascending list and aggregates their results; processing stops as
//! soon as the accumulated violations contain one that is critical and
//! requires an emergency stop. A checker that errors internally is downgraded
//! to a synthetic `CHECKER_ERROR` violation rather than aborting the chain.

mod checker;
mod checkers;
mod context;
mod emergency;
mod error;
mod pipeline;
mod violation;

pub use checker::SafetyChecker;
pub use checkers::{
  AccessControlChecker, DeviceStateChecker, MedicalOverrideChecker, ParameterValidationChecker,
  RateLimitChecker,
};
pub use context::{MedicalContext, OperationRequest, Priority, SafetyContext, UserContext};
pub use emergency::{EmergencyAction, EmergencyHandler, EmergencyProcedure, IncidentRecord};
pub use error::SafetyError;
pub use pipeline::SafetyPipeline;
pub use violation::{SafetyCheckResult, SafetyViolation, Severity};
