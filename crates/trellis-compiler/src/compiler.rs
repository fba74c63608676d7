use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};
use trellis_config::DeviceCategory;
use trellis_device::{ActionTranslator, TemplateCompiler};
use trellis_events::{SharedSink, WorkflowEvent};
use trellis_safety::SafetyContext;
use trellis_workflow::{Node, Workflow};

use crate::error::CompilationError;
use crate::plan::{
  CompileWarning, CompiledPlan, DeviceOperation, DeviceOperationSequence, ExecutionStep,
};

/// Static duration heuristic: per-step overhead plus per-operation cost.
const STEP_OVERHEAD: Duration = Duration::from_millis(2000);
const OPERATION_COST: Duration = Duration::from_millis(1000);

/// Medical sequences run with a tighter timeout and a smaller retry budget.
const MEDICAL_TIMEOUT: Duration = Duration::from_secs(10);
const MEDICAL_RETRIES: u32 = 1;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRIES: u32 = 3;

/// Checker tags attached to every device step, in pipeline order.
const DEVICE_SAFETY_CHECKS: &[&str] = &[
  "parameter_validation",
  "access_control",
  "medical_override",
  "rate_limiting",
  "device_state",
];

/// Compiles workflows into executable plans.
pub struct WorkflowCompiler {
  translator: Option<Arc<dyn ActionTranslator>>,
  templates: Option<Arc<dyn TemplateCompiler>>,
  sink: SharedSink,
}

impl WorkflowCompiler {
  pub fn new(sink: SharedSink) -> Self {
    Self {
      translator: None,
      templates: None,
      sink,
    }
  }

  /// Attach an action translator for nodes that carry free-text actions
  /// instead of explicit capabilities.
  pub fn with_translator(mut self, translator: Arc<dyn ActionTranslator>) -> Self {
    self.translator = Some(translator);
    self
  }

  /// Attach a template compiler for operations that reference a code
  /// template through their `template` parameter.
  pub fn with_template_compiler(mut self, templates: Arc<dyn TemplateCompiler>) -> Self {
    self.templates = Some(templates);
    self
  }

  /// Compile a workflow into a plan.
  ///
  /// Per-step failures become warnings and exclude the step; compilation
  /// fails outright only on a dependency cycle or an empty result.
  #[instrument(name = "workflow_compile", skip(self, workflow), fields(workflow_id = %workflow.workflow_id))]
  pub fn compile(&self, workflow: &Workflow) -> Result<CompiledPlan, CompilationError> {
    self.sink.emit(WorkflowEvent::CompilationStarted {
      workflow_id: workflow.workflow_id.clone(),
    });

    match self.compile_inner(workflow) {
      Ok(plan) => {
        info!(
          plan_id = %plan.plan_id,
          step_count = plan.steps.len(),
          warning_count = plan.warnings.len(),
          estimated_ms = plan.estimated_duration.as_millis() as u64,
          "compilation_completed"
        );
        self.sink.emit(WorkflowEvent::CompilationCompleted {
          workflow_id: workflow.workflow_id.clone(),
          plan_id: plan.plan_id.clone(),
          step_count: plan.steps.len(),
          warning_count: plan.warnings.len(),
        });
        Ok(plan)
      }
      Err(e) => {
        warn!(error = %e, "compilation_failed");
        self.sink.emit(WorkflowEvent::CompilationFailed {
          workflow_id: workflow.workflow_id.clone(),
          reason: e.to_string(),
        });
        Err(e)
      }
    }
  }

  fn compile_inner(&self, workflow: &Workflow) -> Result<CompiledPlan, CompilationError> {
    // Acyclicity is verified here, once, rather than assumed downstream.
    let node_order = workflow.graph().topological_order()?;

    let category = workflow.metadata.device_category;
    let mut steps: HashMap<u64, ExecutionStep> = HashMap::new();
    let mut warnings = Vec::new();

    for node in &workflow.nodes {
      match self.compile_step(node, category) {
        Ok(step) => {
          steps.insert(node.id, step);
        }
        Err(message) => {
          warn!(node_id = node.id, %message, "step_compilation_failed");
          warnings.push(CompileWarning {
            node_id: node.id,
            message,
          });
        }
      }
    }

    if steps.is_empty() {
      return Err(CompilationError::EmptyPlan {
        warning_count: warnings.len(),
      });
    }

    // Replay connections: for edge from -> to, `to` depends on `from`.
    // Edges touching an excluded step are dropped with its warning.
    let surviving: HashSet<u64> = steps.keys().copied().collect();
    for conn in &workflow.connections {
      if surviving.contains(&conn.from)
        && let Some(step) = steps.get_mut(&conn.to)
      {
        let dep = step_id(conn.from);
        if !step.dependencies.contains(&dep) {
          step.dependencies.push(dep);
        }
      }
    }

    let mut order = Vec::with_capacity(steps.len());
    let mut ordered_steps = Vec::with_capacity(steps.len());
    for id in &node_order {
      if let Some(step) = steps.remove(id) {
        order.push(step.step_id.clone());
        ordered_steps.push(step);
      }
    }
    let steps = ordered_steps;

    let estimated_duration = estimate_duration(&steps);

    Ok(CompiledPlan {
      plan_id: uuid::Uuid::new_v4().to_string(),
      workflow_id: workflow.workflow_id.clone(),
      steps,
      order,
      warnings,
      estimated_duration,
    })
  }

  fn compile_step(&self, node: &Node, category: DeviceCategory) -> Result<ExecutionStep, String> {
    let mut device_operations = Vec::new();
    let mut safety_checks = Vec::new();
    let mut rollback_plan = Vec::new();

    if node.is_device_node()
      && let Some(device_id) = node.device_id.clone()
    {
      let capability = self.resolve_capability(node, category)?;

      let mut parameters = node.parameters.clone();
      let expected_result = parameters.remove("expected_result");
      if let Some(template) = parameters.remove("template") {
        let code = self.compile_template(&template, &device_id, &capability, &parameters)?;
        parameters.insert("code".to_string(), serde_json::Value::String(code));
      }

      let (timeout, retry_count) = if category.is_medical() {
        (MEDICAL_TIMEOUT, MEDICAL_RETRIES)
      } else {
        (DEFAULT_TIMEOUT, DEFAULT_RETRIES)
      };

      device_operations.push(DeviceOperationSequence {
        device_id: device_id.clone(),
        device_category: category,
        operations: vec![DeviceOperation {
          sequence: 1,
          capability,
          parameters,
          expected_result,
        }],
        safety_context: SafetyContext::for_category(category),
        timeout,
        retry_count,
      });

      safety_checks = DEVICE_SAFETY_CHECKS.iter().map(|s| s.to_string()).collect();
      rollback_plan.push(DeviceOperation {
        sequence: 1,
        capability: "set_safe_state".to_string(),
        parameters: HashMap::new(),
        expected_result: None,
      });
    }

    Ok(ExecutionStep {
      step_id: step_id(node.id),
      node_id: node.id,
      device_operations,
      dependencies: Vec::new(),
      safety_checks,
      rollback_plan,
    })
  }

  /// Explicit capability wins; otherwise the action text goes through the
  /// translator. A device node with neither resolvable fails the step.
  fn resolve_capability(&self, node: &Node, category: DeviceCategory) -> Result<String, String> {
    if let Some(capability) = &node.capability {
      return Ok(capability.clone());
    }

    let action = node
      .action
      .as_ref()
      .ok_or_else(|| "device node has neither capability nor action".to_string())?;

    let translator = self
      .translator
      .as_ref()
      .ok_or_else(|| format!("no action translator available for action '{action}'"))?;

    let parsed = translator
      .parse_action(action)
      .ok_or_else(|| format!("action '{action}' could not be parsed"))?;
    let mapped = translator
      .map_verb_to_operation(&parsed, category)
      .ok_or_else(|| format!("action '{action}' has no capability mapping"))?;

    Ok(mapped.capability)
  }

  /// A `template` parameter names a code template; its compiled output
  /// lands in the operation's `code` parameter. Template errors fail the
  /// step like any other resolution failure.
  fn compile_template(
    &self,
    template: &serde_json::Value,
    device_id: &str,
    capability: &str,
    parameters: &HashMap<String, serde_json::Value>,
  ) -> Result<String, String> {
    let template_id = template
      .as_str()
      .ok_or_else(|| "template reference must be a string".to_string())?;

    let templates = self
      .templates
      .as_ref()
      .ok_or_else(|| format!("no template compiler available for template '{template_id}'"))?;

    let context = serde_json::json!({
      "deviceId": device_id,
      "capability": capability,
    });
    let compiled = templates.compile_template(template_id, parameters, &context);
    if compiled.errors.is_empty() {
      Ok(compiled.code)
    } else {
      Err(format!(
        "template '{template_id}' failed to compile: {}",
        compiled.errors.join("; ")
      ))
    }
  }
}

fn step_id(node_id: u64) -> String {
  format!("step-{node_id}")
}

fn estimate_duration(steps: &[ExecutionStep]) -> Duration {
  let operation_count: u32 = steps
    .iter()
    .flat_map(|s| &s.device_operations)
    .map(|seq| seq.operations.len() as u32)
    .sum();
  STEP_OVERHEAD * steps.len() as u32 + OPERATION_COST * operation_count
}
