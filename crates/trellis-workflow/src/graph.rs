use std::collections::{HashMap, VecDeque};

use crate::error::WorkflowError;
use crate::node::Node;
use crate::workflow::Connection;

/// Dependency graph over workflow nodes.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: node id -> downstream node ids.
  adjacency: HashMap<u64, Vec<u64>>,
  /// Reverse adjacency: node id -> upstream node ids.
  reverse_adjacency: HashMap<u64, Vec<u64>>,
}

impl Graph {
  /// Build a graph from nodes and connections.
  pub fn new(nodes: &[Node], connections: &[Connection]) -> Self {
    let mut adjacency: HashMap<u64, Vec<u64>> = HashMap::new();
    let mut reverse_adjacency: HashMap<u64, Vec<u64>> = HashMap::new();

    for node in nodes {
      adjacency.entry(node.id).or_default();
      reverse_adjacency.entry(node.id).or_default();
    }

    for conn in connections {
      adjacency.entry(conn.from).or_default().push(conn.to);
      reverse_adjacency.entry(conn.to).or_default().push(conn.from);
    }

    Self {
      adjacency,
      reverse_adjacency,
    }
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: u64) -> &[u64] {
    self
      .adjacency
      .get(&node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: u64) -> &[u64] {
    self
      .reverse_adjacency
      .get(&node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Kahn's algorithm. Returns node ids in dependency order, or the set of
  /// nodes stuck on a cycle.
  ///
  /// Ties are broken by ascending node id so the order is deterministic.
  pub fn topological_order(&self) -> Result<Vec<u64>, WorkflowError> {
    let mut in_degree: HashMap<u64, usize> = self
      .adjacency
      .keys()
      .map(|id| (*id, self.upstream(*id).len()))
      .collect();

    let mut roots: Vec<u64> = in_degree
      .iter()
      .filter(|(_, deg)| **deg == 0)
      .map(|(id, _)| *id)
      .collect();
    roots.sort_unstable();

    let mut queue: VecDeque<u64> = roots.into();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(id) = queue.pop_front() {
      order.push(id);
      let mut released: Vec<u64> = Vec::new();
      for next in self.downstream(id) {
        if let Some(deg) = in_degree.get_mut(next) {
          *deg -= 1;
          if *deg == 0 {
            released.push(*next);
          }
        }
      }
      released.sort_unstable();
      queue.extend(released);
    }

    if order.len() < in_degree.len() {
      let mut stuck: Vec<u64> = in_degree
        .into_iter()
        .filter(|(id, _)| !order.contains(id))
        .map(|(id, _)| id)
        .collect();
      stuck.sort_unstable();
      return Err(WorkflowError::CycleDetected(stuck));
    }

    Ok(order)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn node(id: u64) -> Node {
    Node {
      id,
      node_type: "device".into(),
      device_id: None,
      capability: None,
      action: None,
      parameters: Default::default(),
    }
  }

  fn conn(from: u64, to: u64) -> Connection {
    Connection { from, to }
  }

  #[test]
  fn topological_order_respects_edges() {
    let nodes = vec![node(1), node(2), node(3), node(4)];
    let graph = Graph::new(&nodes, &[conn(1, 3), conn(2, 3), conn(3, 4)]);

    let order = graph.topological_order().unwrap();
    let pos = |id: u64| order.iter().position(|n| *n == id).unwrap();
    assert!(pos(1) < pos(3));
    assert!(pos(2) < pos(3));
    assert!(pos(3) < pos(4));
  }

  #[test]
  fn cycle_is_detected() {
    let nodes = vec![node(1), node(2), node(3)];
    let graph = Graph::new(&nodes, &[conn(1, 2), conn(2, 3), conn(3, 1)]);

    let err = graph.topological_order().unwrap_err();
    assert!(matches!(err, WorkflowError::CycleDetected(ids) if ids == vec![1, 2, 3]));
  }

  #[test]
  fn disconnected_nodes_are_ordered() {
    let nodes = vec![node(5), node(9)];
    let graph = Graph::new(&nodes, &[]);
    let order = graph.topological_order().unwrap();
    assert_eq!(order, vec![5, 9]);
  }
}
