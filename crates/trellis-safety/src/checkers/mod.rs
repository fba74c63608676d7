//! The five built-in checkers, in pipeline order.

mod access;
mod device_state;
mod medical;
mod parameter;
mod rate;

pub use access::AccessControlChecker;
pub use device_state::DeviceStateChecker;
pub use medical::MedicalOverrideChecker;
pub use parameter::ParameterValidationChecker;
pub use rate::RateLimitChecker;
