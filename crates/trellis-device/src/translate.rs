use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use trellis_config::DeviceCategory;

/// Natural-language action broken into grammatical slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedAction {
  pub verb: String,
  pub noun: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub instrument: Option<String>,
}

/// A capability invocation derived from a parsed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedOperation {
  pub capability: String,
  #[serde(default)]
  pub parameters: HashMap<String, serde_json::Value>,
}

/// Output of a template compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledTemplate {
  pub code: String,
  #[serde(default)]
  pub errors: Vec<String>,
}

/// Translates free-text node actions into device capabilities.
///
/// Both methods are pure; implementations must not perform I/O. `None` from
/// either method means the action cannot be resolved, which the compiler
/// records as a per-step warning.
pub trait ActionTranslator: Send + Sync {
  fn parse_action(&self, text: &str) -> Option<ParsedAction>;

  fn map_verb_to_operation(
    &self,
    action: &ParsedAction,
    category: DeviceCategory,
  ) -> Option<MappedOperation>;
}
