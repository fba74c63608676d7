//! Integration tests for workflow compilation.

use std::sync::Arc;
use std::time::Duration;

use std::collections::HashMap;

use serde_json::json;
use trellis_compiler::{CompilationError, WorkflowCompiler};
use trellis_config::DeviceCategory;
use trellis_device::{
  ActionTranslator, CompiledTemplate, MappedOperation, ParsedAction, TemplateCompiler,
};
use trellis_events::NullSink;
use trellis_workflow::{Workflow, WorkflowError, WorkflowParser};

fn parse(payload: serde_json::Value) -> Workflow {
  WorkflowParser::new(Arc::new(NullSink))
    .parse(&payload)
    .expect("payload should parse")
}

fn compiler() -> WorkflowCompiler {
  WorkflowCompiler::new(Arc::new(NullSink))
}

fn diamond_workflow(category: &str) -> Workflow {
  parse(json!({
    "nodes": [
      {"id": 1, "type": "device", "data": {"deviceId": "dev-a", "capability": "start"}},
      {"id": 2, "type": "device", "data": {"deviceId": "dev-b", "capability": "measure"}},
      {"id": 3, "type": "device", "data": {"deviceId": "dev-c", "capability": "adjust"}},
      {"id": 4, "type": "device", "data": {"deviceId": "dev-d", "capability": "stop"}}
    ],
    "connections": [
      {"from": {"node": 1}, "to": {"node": 2}},
      {"from": {"node": 1}, "to": {"node": 3}},
      {"from": {"node": 2}, "to": {"node": 4}},
      {"from": {"node": 3}, "to": {"node": 4}}
    ],
    "metadata": {"deviceCategory": category}
  }))
}

#[test]
fn one_step_per_node_with_predecessor_dependencies() {
  let workflow = diamond_workflow("personal");
  let plan = compiler().compile(&workflow).unwrap();

  assert_eq!(plan.steps.len(), 4);
  assert!(plan.warnings.is_empty());

  let step = |id: &str| plan.get_step(id).unwrap();
  assert!(step("step-1").dependencies.is_empty());
  assert_eq!(step("step-2").dependencies, vec!["step-1"]);
  assert_eq!(step("step-3").dependencies, vec!["step-1"]);
  let mut deps = step("step-4").dependencies.clone();
  deps.sort();
  assert_eq!(deps, vec!["step-2", "step-3"]);
}

#[test]
fn order_is_topological() {
  let workflow = diamond_workflow("personal");
  let plan = compiler().compile(&workflow).unwrap();

  let pos = |id: &str| plan.order.iter().position(|s| s == id).unwrap();
  assert!(pos("step-1") < pos("step-2"));
  assert!(pos("step-1") < pos("step-3"));
  assert!(pos("step-2") < pos("step-4"));
  assert!(pos("step-3") < pos("step-4"));
}

#[test]
fn recompilation_is_deterministic_up_to_identity() {
  let workflow = diamond_workflow("medical");
  let first = compiler().compile(&workflow).unwrap();
  let second = compiler().compile(&workflow).unwrap();

  assert_ne!(first.plan_id, second.plan_id);
  assert_eq!(first.steps, second.steps);
  assert_eq!(first.order, second.order);
  assert_eq!(first.estimated_duration, second.estimated_duration);
}

#[test]
fn cycle_fails_compilation() {
  let workflow = parse(json!({
    "nodes": [
      {"id": 1, "type": "device", "data": {"deviceId": "a", "capability": "x"}},
      {"id": 2, "type": "device", "data": {"deviceId": "b", "capability": "y"}}
    ],
    "connections": [
      {"from": {"node": 1}, "to": {"node": 2}},
      {"from": {"node": 2}, "to": {"node": 1}}
    ],
    "metadata": {}
  }));

  let err = compiler().compile(&workflow).unwrap_err();
  assert!(matches!(
    err,
    CompilationError::Graph(WorkflowError::CycleDetected(_))
  ));
}

#[test]
fn medical_category_tightens_the_safety_context() {
  let medical = compiler().compile(&diamond_workflow("medical")).unwrap();
  let seq = &medical.steps[0].device_operations[0];
  assert_eq!(seq.timeout, Duration::from_secs(10));
  assert_eq!(seq.retry_count, 1);
  assert!(seq.device_category.is_medical());

  let personal = compiler().compile(&diamond_workflow("personal")).unwrap();
  let seq = &personal.steps[0].device_operations[0];
  assert_eq!(seq.timeout, Duration::from_secs(30));
  assert_eq!(seq.retry_count, 3);
}

#[test]
fn duration_follows_the_static_heuristic() {
  // 4 steps, 4 single-operation sequences: 4*2000 + 4*1000 = 12000ms.
  let plan = compiler().compile(&diamond_workflow("personal")).unwrap();
  assert_eq!(plan.estimated_duration, Duration::from_millis(12_000));
}

#[test]
fn device_steps_carry_checker_tags_and_rollback() {
  let plan = compiler().compile(&diamond_workflow("medical")).unwrap();
  let step = &plan.steps[0];
  assert_eq!(step.safety_checks.len(), 5);
  assert_eq!(step.safety_checks[0], "parameter_validation");
  assert_eq!(step.rollback_plan.len(), 1);
  assert_eq!(step.rollback_plan[0].capability, "set_safe_state");
}

#[test]
fn unresolvable_action_is_a_warning_not_a_failure() {
  // Second node has an action but no translator is attached.
  let workflow = parse(json!({
    "nodes": [
      {"id": 1, "type": "device", "data": {"deviceId": "a", "capability": "start"}},
      {"id": 2, "type": "device", "data": {"deviceId": "b", "action": "open the vent"}}
    ],
    "connections": [{"from": {"node": 1}, "to": {"node": 2}}],
    "metadata": {}
  }));

  let plan = compiler().compile(&workflow).unwrap();
  assert_eq!(plan.steps.len(), 1);
  assert_eq!(plan.warnings.len(), 1);
  assert_eq!(plan.warnings[0].node_id, 2);
}

#[test]
fn all_steps_failing_is_fatal() {
  let workflow = parse(json!({
    "nodes": [
      {"id": 1, "type": "device", "data": {"deviceId": "a", "action": "do something"}}
    ],
    "connections": [],
    "metadata": {}
  }));

  let err = compiler().compile(&workflow).unwrap_err();
  assert!(matches!(err, CompilationError::EmptyPlan { warning_count: 1 }));
}

#[test]
fn non_device_nodes_compile_to_empty_steps() {
  let workflow = parse(json!({
    "nodes": [
      {"id": 1, "type": "delay", "data": {}},
      {"id": 2, "type": "device", "data": {"deviceId": "a", "capability": "start"}}
    ],
    "connections": [{"from": {"node": 1}, "to": {"node": 2}}],
    "metadata": {}
  }));

  let plan = compiler().compile(&workflow).unwrap();
  let delay = plan.get_step("step-1").unwrap();
  assert!(delay.device_operations.is_empty());
  assert!(delay.safety_checks.is_empty());
  // 2 steps, 1 operation: 2*2000 + 1*1000.
  assert_eq!(plan.estimated_duration, Duration::from_millis(5_000));
}

/// Verb-noun splitter: the first word is the verb, the last is the noun.
struct FirstWordTranslator;

impl ActionTranslator for FirstWordTranslator {
  fn parse_action(&self, text: &str) -> Option<ParsedAction> {
    let mut words = text.split_whitespace();
    let verb = words.next()?.to_string();
    let noun = words.last()?.to_string();
    Some(ParsedAction {
      verb,
      noun,
      location: None,
      instrument: None,
    })
  }

  fn map_verb_to_operation(
    &self,
    action: &ParsedAction,
    _category: DeviceCategory,
  ) -> Option<MappedOperation> {
    match action.verb.as_str() {
      "open" => Some(MappedOperation {
        capability: format!("{}_open", action.noun),
        parameters: HashMap::new(),
      }),
      _ => None,
    }
  }
}

#[test]
fn free_text_actions_resolve_through_the_translator() {
  let workflow = parse(json!({
    "nodes": [
      {"id": 1, "type": "device", "data": {"deviceId": "hvac", "action": "open the vent"}}
    ],
    "connections": [],
    "metadata": {}
  }));

  let plan = WorkflowCompiler::new(Arc::new(NullSink))
    .with_translator(Arc::new(FirstWordTranslator))
    .compile(&workflow)
    .unwrap();

  assert!(plan.warnings.is_empty());
  let op = &plan.steps[0].device_operations[0].operations[0];
  assert_eq!(op.capability, "vent_open");
}

/// Fails templates named "broken", expands everything else.
struct StubTemplates;

impl TemplateCompiler for StubTemplates {
  fn compile_template(
    &self,
    template_id: &str,
    parameters: &HashMap<String, serde_json::Value>,
    _context: &serde_json::Value,
  ) -> CompiledTemplate {
    if template_id == "broken" {
      CompiledTemplate {
        code: String::new(),
        errors: vec!["unknown template".to_string()],
      }
    } else {
      CompiledTemplate {
        code: format!("run {template_id} with {} parameter(s)", parameters.len()),
        errors: Vec::new(),
      }
    }
  }
}

#[test]
fn template_parameters_compile_into_operation_code() {
  let workflow = parse(json!({
    "nodes": [
      {"id": 1, "type": "device", "data": {
        "deviceId": "lamp",
        "capability": "power_on",
        "parameters": {"template": "fade_in", "duration": 2}
      }}
    ],
    "connections": [],
    "metadata": {}
  }));

  let plan = WorkflowCompiler::new(Arc::new(NullSink))
    .with_template_compiler(Arc::new(StubTemplates))
    .compile(&workflow)
    .unwrap();

  let op = &plan.steps[0].device_operations[0].operations[0];
  assert!(!op.parameters.contains_key("template"));
  assert_eq!(
    op.parameters.get("code").and_then(|v| v.as_str()),
    Some("run fade_in with 1 parameter(s)")
  );
}

#[test]
fn template_errors_fail_the_step_as_a_warning() {
  let workflow = parse(json!({
    "nodes": [
      {"id": 1, "type": "device", "data": {"deviceId": "lamp", "capability": "power_on"}},
      {"id": 2, "type": "device", "data": {
        "deviceId": "lamp",
        "capability": "power_off",
        "parameters": {"template": "broken"}
      }}
    ],
    "connections": [{"from": {"node": 1}, "to": {"node": 2}}],
    "metadata": {}
  }));

  let plan = WorkflowCompiler::new(Arc::new(NullSink))
    .with_template_compiler(Arc::new(StubTemplates))
    .compile(&workflow)
    .unwrap();

  assert_eq!(plan.steps.len(), 1);
  assert_eq!(plan.warnings.len(), 1);
  assert_eq!(plan.warnings[0].node_id, 2);
}
