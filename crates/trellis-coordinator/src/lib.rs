//! Trellis Coordinator
//!
//! Drives compiled plans to completion. One execution at a time walks its
//! plan's precomputed topological order; each device operation passes through
//! the safety pipeline before it is delegated to the device executor, with a
//! bounded retry loop, an overall deadline, cooperative cancellation, and
//! best-effort rollback on failure.
//!
//! The coordinator owns the two process-wide stores: the compiled-plan cache
//! and the active-execution registry. Nothing outside this crate writes them.

mod coordinator;
mod error;
mod options;
mod state;

pub use coordinator::ExecutionCoordinator;
pub use error::CoordinatorError;
pub use options::ExecutionOptions;
pub use state::{
  ExecutionFailure, ExecutionStatus, OperationExecution, OperationStatus, StepExecution,
  StepResult, StepStatus, WorkflowExecution,
};
