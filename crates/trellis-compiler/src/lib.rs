//! Trellis Compiler
//!
//! Converts a parsed [`trellis_workflow::Workflow`] into a [`CompiledPlan`]:
//! one execution step per node, device operation sequences with
//! category-derived safety contexts, dependency edges replayed from the
//! workflow connections, rollback plans, and a static duration estimate.
//!
//! Compilation of an individual step may fail (for example an unresolvable
//! capability mapping); such failures are recorded as warnings and the step
//! is excluded. Compilation as a whole fails only when no steps survive or
//! the graph contains a dependency cycle.

mod compiler;
mod error;
mod plan;

pub use compiler::WorkflowCompiler;
pub use error::CompilationError;
pub use plan::{
  CompileWarning, CompiledPlan, DeviceOperation, DeviceOperationSequence, ExecutionStep,
};
