//! Trellis Workflow
//!
//! The normalized workflow representation. A `Workflow` is the validated,
//! immutable form of an editor payload, ready for compilation.
//!
//! Key differences from `trellis-config`:
//! - Structure is validated (arrays present, node ids unique, edges resolve)
//! - Metadata defaults are filled and a complexity score is attached
//! - The dependency graph can be built and topologically ordered

mod error;
mod graph;
mod node;
mod parser;
mod workflow;

pub use error::{ValidationError, WorkflowError};
pub use graph::Graph;
pub use node::Node;
pub use parser::WorkflowParser;
pub use workflow::{Connection, Metadata, Workflow};
