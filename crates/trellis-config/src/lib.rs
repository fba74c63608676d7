//! Trellis Config
//!
//! This crate contains the serializable workflow definition types emitted by
//! the visual editor. These types represent a workflow exactly as it arrives
//! on the wire, before the parser validates and normalizes it.
//!
//! Definitions can be loaded from:
//! - JSON files (via CLI with `trellis run workflow.json`)
//! - The editor's export payload
//!
//! The parser in `trellis-workflow` takes these definition types, validates
//! them, fills defaults, and produces the immutable runtime `Workflow`.

mod connection;
mod enums;
mod metadata;
mod node;
mod workflow;

pub use connection::{ConnectionDef, EndpointDef};
pub use enums::{DeviceCategory, SafetyLevel};
pub use metadata::MetadataDef;
pub use node::{NodeDataDef, NodeDef, PinDef};
pub use workflow::WorkflowDef;
