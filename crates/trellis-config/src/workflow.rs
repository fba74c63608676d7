use serde::{Deserialize, Serialize};

use crate::connection::ConnectionDef;
use crate::metadata::MetadataDef;
use crate::node::NodeDef;

/// A complete workflow definition as exported by the visual editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub nodes: Vec<NodeDef>,
  pub connections: Vec<ConnectionDef>,
  pub metadata: MetadataDef,
}
