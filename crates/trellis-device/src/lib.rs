//! Trellis Device
//!
//! Collaborator seams the execution core consumes. The core never talks to a
//! physical device or a network protocol directly: it issues a
//! [`DeviceCommand`] through a [`DeviceExecutor`] and queries health through a
//! [`DeviceStatusProvider`]. Protocol adapters (HTTP, WebSocket, MQTT) live
//! behind these traits, outside this repository.
//!
//! [`DeviceExecutor::execute`] takes a `CancellationToken`. Cancellation in
//! the core is cooperative bookkeeping; a true abort only happens when the
//! executor honors the token. That gap is contractual, not accidental.

mod command;
mod error;
mod simulated;
mod status;
mod traits;
mod translate;

pub use command::{DeviceCommand, OperationMetrics, OperationOutcome};
pub use error::DeviceError;
pub use simulated::{SimulatedDevice, SimulatedFleet};
pub use status::DeviceStatus;
pub use traits::{DeviceExecutor, DeviceStatusProvider, TemplateCompiler};
pub use translate::{ActionTranslator, CompiledTemplate, MappedOperation, ParsedAction};
