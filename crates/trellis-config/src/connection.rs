use serde::{Deserialize, Serialize};

/// A directed edge between two nodes.
///
/// The target node's step depends on the source node's step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDef {
  pub from: EndpointDef,
  pub to: EndpointDef,
}

/// One end of a connection: a node id plus the pin index on that node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDef {
  pub node: u64,
  #[serde(default)]
  pub pin_index: u32,
}
