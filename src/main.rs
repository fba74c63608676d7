use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use trellis_compiler::{CompiledPlan, WorkflowCompiler};
use trellis_coordinator::{ExecutionCoordinator, ExecutionOptions, ExecutionStatus};
use trellis_device::{SimulatedDevice, SimulatedFleet};
use trellis_events::{NullSink, SharedSink};
use trellis_safety::{EmergencyHandler, Priority, SafetyPipeline, UserContext};
use trellis_workflow::WorkflowParser;

/// Trellis - a device workflow orchestration engine
#[derive(Parser)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a workflow into an execution plan and print it
  Compile {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Compile and execute a workflow against a simulated device fleet
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// User id attached to every operation request
    #[arg(long, default_value = "operator")]
    user: String,

    /// Permission granted to the user (repeatable)
    #[arg(long = "permission", default_value = "device_control")]
    permissions: Vec<String>,

    /// Request priority: normal, high, urgent, or emergency
    #[arg(long, default_value = "normal")]
    priority: String,

    /// Overall deadline in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Bypass the safety pipeline (simulated fleets only)
    #[arg(long)]
    skip_safety: bool,
  },
}

fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Compile { workflow_file }) => compile_command(workflow_file),
    Some(Commands::Run {
      workflow_file,
      user,
      permissions,
      priority,
      timeout_ms,
      skip_safety,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async {
        run_command(
          workflow_file,
          user,
          permissions,
          priority,
          timeout_ms,
          skip_safety,
        )
        .await
      })
    }
    None => {
      println!("trellis - use --help to see available commands");
      Ok(())
    }
  }
}

fn init_tracing() {
  use tracing_subscriber::EnvFilter;

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

fn compile_command(workflow_file: PathBuf) -> Result<()> {
  let sink: SharedSink = Arc::new(NullSink);
  let plan = load_plan(&workflow_file, &sink)?;

  eprintln!(
    "Compiled plan {} with {} step(s), estimated {}ms",
    plan.plan_id,
    plan.steps.len(),
    plan.estimated_duration.as_millis()
  );
  for warning in &plan.warnings {
    eprintln!("warning: node {}: {}", warning.node_id, warning.message);
  }

  println!("{}", serde_json::to_string_pretty(&plan)?);
  Ok(())
}

async fn run_command(
  workflow_file: PathBuf,
  user: String,
  permissions: Vec<String>,
  priority: String,
  timeout_ms: Option<u64>,
  skip_safety: bool,
) -> Result<()> {
  let sink: SharedSink = Arc::new(NullSink);
  let plan = load_plan(&workflow_file, &sink)?;

  // Every device the plan touches gets a healthy simulated stand-in.
  let fleet = seed_fleet(&plan);
  let executor = Arc::new(fleet.clone());
  let emergency = Arc::new(EmergencyHandler::new(executor.clone(), sink.clone()));
  let pipeline = Arc::new(SafetyPipeline::new(
    Arc::new(fleet),
    emergency,
    sink.clone(),
  ));
  let coordinator = ExecutionCoordinator::new(executor, pipeline, sink);

  let perms: Vec<&str> = permissions.iter().map(String::as_str).collect();
  let user = UserContext::new(user, &perms);
  let options = ExecutionOptions {
    timeout: timeout_ms.map(Duration::from_millis),
    skip_safety_checks: skip_safety,
    priority: parse_priority(&priority)?,
    ..ExecutionOptions::default()
  };

  let execution = coordinator.execute_workflow(&plan, &user, options).await;

  eprintln!(
    "Execution {} finished: {:?} ({}%)",
    execution.execution_id, execution.status, execution.progress
  );

  println!("{}", serde_json::to_string_pretty(&execution)?);

  match execution.status {
    ExecutionStatus::Completed => Ok(()),
    _ => {
      let detail = execution
        .error
        .map(|e| format!("{}: {}", e.code, e.message))
        .unwrap_or_else(|| "cancelled".to_string());
      bail!("execution did not complete: {detail}")
    }
  }
}

fn load_plan(workflow_file: &Path, sink: &SharedSink) -> Result<CompiledPlan> {
  let content = std::fs::read_to_string(workflow_file)
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;
  let payload: serde_json::Value = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  let workflow = WorkflowParser::new(sink.clone())
    .parse(&payload)
    .context("workflow validation failed")?;
  eprintln!(
    "Loaded workflow '{}' with {} node(s)",
    workflow.metadata.name,
    workflow.nodes.len()
  );

  WorkflowCompiler::new(sink.clone())
    .compile(&workflow)
    .context("workflow compilation failed")
}

fn seed_fleet(plan: &CompiledPlan) -> SimulatedFleet {
  let mut capabilities: HashMap<String, Vec<String>> = HashMap::new();
  for step in &plan.steps {
    for sequence in &step.device_operations {
      let entry = capabilities.entry(sequence.device_id.clone()).or_default();
      for operation in &sequence.operations {
        entry.push(operation.capability.clone());
      }
    }
  }

  let fleet = SimulatedFleet::new();
  for (device_id, caps) in capabilities {
    let refs: Vec<&str> = caps.iter().map(String::as_str).collect();
    fleet.insert(device_id, SimulatedDevice::online(&refs));
  }
  fleet
}

fn parse_priority(value: &str) -> Result<Priority> {
  match value {
    "normal" => Ok(Priority::Normal),
    "high" => Ok(Priority::High),
    "urgent" => Ok(Priority::Urgent),
    "emergency" => Ok(Priority::Emergency),
    other => bail!("unknown priority '{other}' (expected normal, high, urgent, or emergency)"),
  }
}
