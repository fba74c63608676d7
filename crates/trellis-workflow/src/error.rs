use thiserror::Error;

/// Rejections of a raw editor payload. All of these are fatal: no workflow
/// is produced.
#[derive(Debug, Error)]
pub enum ValidationError {
  #[error("workflow field '{0}' is missing or not a sequence")]
  NotASequence(&'static str),

  #[error("workflow metadata is missing")]
  MissingMetadata,

  #[error("malformed workflow payload: {0}")]
  Malformed(String),

  #[error("duplicate node id {0}")]
  DuplicateNodeId(u64),

  #[error("connection references unknown node: from={from}, to={to}")]
  UnknownConnectionNode { from: u64, to: u64 },
}

/// Graph-level errors surfaced during analysis.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("dependency cycle detected involving nodes {0:?}")]
  CycleDetected(Vec<u64>),
}
