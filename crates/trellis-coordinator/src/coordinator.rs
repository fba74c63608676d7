//! The execution coordinator.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use trellis_compiler::{CompiledPlan, DeviceOperationSequence, ExecutionStep};
use trellis_device::{DeviceCommand, DeviceExecutor};
use trellis_events::{SharedSink, WorkflowEvent};
use trellis_safety::{OperationRequest, SafetyPipeline, Severity, UserContext};

use crate::error::CoordinatorError;
use crate::options::ExecutionOptions;
use crate::state::{
  ExecutionFailure, ExecutionStatus, OperationExecution, OperationStatus, StepExecution,
  StepResult, StepStatus, WorkflowExecution,
};

/// Shared, mutable handle to one execution's bookkeeping.
type ExecutionHandle = Arc<RwLock<WorkflowExecution>>;

struct ExecutionEntry {
  execution: ExecutionHandle,
  cancel: CancellationToken,
}

/// How one drive pass ended.
enum DriveOutcome {
  Completed,
  Failed(ExecutionFailure),
  Cancelled,
}

/// Why a step aborted mid-flight.
enum StepAbort {
  Cancelled,
  Failure(ExecutionFailure),
}

/// Drives compiled plans against a device executor, gated by the safety
/// pipeline. Owns the plan cache and the active-execution registry; no
/// external caller mutates either store.
pub struct ExecutionCoordinator {
  executor: Arc<dyn DeviceExecutor>,
  pipeline: Arc<SafetyPipeline>,
  sink: SharedSink,
  plans: RwLock<HashMap<String, CompiledPlan>>,
  executions: RwLock<HashMap<String, ExecutionEntry>>,
}

impl ExecutionCoordinator {
  pub fn new(
    executor: Arc<dyn DeviceExecutor>,
    pipeline: Arc<SafetyPipeline>,
    sink: SharedSink,
  ) -> Self {
    Self {
      executor,
      pipeline,
      sink,
      plans: RwLock::new(HashMap::new()),
      executions: RwLock::new(HashMap::new()),
    }
  }

  /// Execute a compiled plan to a terminal state.
  ///
  /// The returned snapshot is terminal: completed, failed, or cancelled.
  /// Every failure is attached as a structured [`ExecutionFailure`]; no raw
  /// error crosses this boundary. The execution stays in the registry for
  /// inspection until [`Self::evict_execution`].
  #[instrument(
    name = "workflow_execute",
    skip(self, plan, user, options),
    fields(plan_id = %plan.plan_id)
  )]
  pub async fn execute_workflow(
    &self,
    plan: &CompiledPlan,
    user: &UserContext,
    options: ExecutionOptions,
  ) -> WorkflowExecution {
    self.cache_plan(plan.clone());

    let execution_id = uuid::Uuid::new_v4().to_string();
    let cancel = CancellationToken::new();
    let handle: ExecutionHandle = Arc::new(RwLock::new(WorkflowExecution {
      execution_id: execution_id.clone(),
      plan_id: plan.plan_id.clone(),
      status: ExecutionStatus::Running,
      progress: 0,
      steps: plan
        .steps
        .iter()
        .map(|s| StepExecution::pending(&s.step_id))
        .collect(),
      results: Vec::new(),
      error: None,
    }));

    self.executions.write().unwrap().insert(
      execution_id.clone(),
      ExecutionEntry {
        execution: handle.clone(),
        cancel: cancel.clone(),
      },
    );

    info!(execution_id = %execution_id, "execution_started");
    self.sink.emit(WorkflowEvent::ExecutionStarted {
      execution_id: execution_id.clone(),
      plan_id: plan.plan_id.clone(),
    });

    let deadline = options.timeout.unwrap_or(plan.estimated_duration * 2);
    let outcome = tokio::select! {
      outcome = self.drive(plan, &handle, user, &options, &cancel) => outcome,
      _ = cancel.cancelled() => DriveOutcome::Cancelled,
      _ = tokio::time::sleep(deadline) => DriveOutcome::Failed(ExecutionFailure::new(
        "EXECUTION_TIMEOUT",
        format!("execution exceeded its deadline of {}ms", deadline.as_millis()),
        Severity::High,
        false,
      )),
    };

    match outcome {
      DriveOutcome::Completed => {
        let mut execution = handle.write().unwrap();
        if execution.status == ExecutionStatus::Running {
          execution.status = ExecutionStatus::Completed;
          execution.recompute_progress();
        }
        drop(execution);
        info!(execution_id = %execution_id, "execution_completed");
        self.sink.emit(WorkflowEvent::ExecutionCompleted {
          execution_id: execution_id.clone(),
        });
      }
      DriveOutcome::Failed(failure) => {
        {
          let mut execution = handle.write().unwrap();
          if execution.status == ExecutionStatus::Running {
            // A timeout leaves in-flight steps behind; close them out so
            // rollback can see them.
            for step in &mut execution.steps {
              if step.status == StepStatus::Running {
                step.status = StepStatus::Failed;
              }
              for op in &mut step.operations {
                if op.status.is_in_flight() {
                  op.status = OperationStatus::Failed;
                }
              }
            }
            execution.status = ExecutionStatus::Failed;
            execution.error = Some(failure.clone());
          }
        }
        error!(
          execution_id = %execution_id,
          code = %failure.code,
          message = %failure.message,
          "execution_failed"
        );
        self.rollback_failed_steps(plan, &handle).await;
        self.sink.emit(WorkflowEvent::ExecutionFailed {
          execution_id: execution_id.clone(),
          code: failure.code.clone(),
          message: failure.message.clone(),
        });
      }
      DriveOutcome::Cancelled => {
        // Status and events were handled by cancel_execution; in-flight
        // suspended calls were left to finish naturally.
        warn!(execution_id = %execution_id, "execution_cancelled");
      }
    }

    let snapshot = handle.read().unwrap().clone();
    snapshot
  }

  /// Execute a plan previously stored in the cache.
  pub async fn execute_cached(
    &self,
    plan_id: &str,
    user: &UserContext,
    options: ExecutionOptions,
  ) -> Result<WorkflowExecution, CoordinatorError> {
    let plan = self
      .get_plan(plan_id)
      .ok_or_else(|| CoordinatorError::PlanNotFound(plan_id.to_string()))?;
    Ok(self.execute_workflow(&plan, user, options).await)
  }

  /// Walk the plan's topological order, one step at a time.
  async fn drive(
    &self,
    plan: &CompiledPlan,
    handle: &ExecutionHandle,
    user: &UserContext,
    options: &ExecutionOptions,
    cancel: &CancellationToken,
  ) -> DriveOutcome {
    let execution_id = handle.read().unwrap().execution_id.clone();

    for step_id in &plan.order {
      if cancel.is_cancelled() {
        return DriveOutcome::Cancelled;
      }

      let Some(step) = plan.get_step(step_id) else {
        continue;
      };

      // The order already respects dependencies; this guards against a
      // dependency that failed or was skipped.
      let deps_completed = {
        let execution = handle.read().unwrap();
        step.dependencies.iter().all(|dep| {
          execution
            .step(dep)
            .is_some_and(|s| s.status == StepStatus::Completed)
        })
      };
      if !deps_completed {
        let mut execution = handle.write().unwrap();
        if let Some(s) = execution.step_mut(step_id) {
          s.status = StepStatus::Skipped;
        }
        continue;
      }

      {
        let mut execution = handle.write().unwrap();
        if let Some(s) = execution.step_mut(step_id) {
          s.status = StepStatus::Running;
        }
      }
      info!(execution_id = %execution_id, step_id = %step_id, "step_started");
      self.sink.emit(WorkflowEvent::StepStarted {
        execution_id: execution_id.clone(),
        step_id: step_id.clone(),
      });

      match self
        .run_step(step, handle, user, options, cancel, &execution_id)
        .await
      {
        Ok(()) => {
          let progress = {
            let mut execution = handle.write().unwrap();
            if let Some(s) = execution.step_mut(step_id) {
              s.status = StepStatus::Completed;
            }
            execution.recompute_progress();
            execution.progress
          };
          info!(execution_id = %execution_id, step_id = %step_id, "step_completed");
          self.sink.emit(WorkflowEvent::StepCompleted {
            execution_id: execution_id.clone(),
            step_id: step_id.clone(),
          });
          self.sink.emit(WorkflowEvent::ProgressUpdate {
            execution_id: execution_id.clone(),
            progress,
          });
        }
        Err(StepAbort::Cancelled) => return DriveOutcome::Cancelled,
        Err(StepAbort::Failure(failure)) => {
          {
            let mut execution = handle.write().unwrap();
            if let Some(s) = execution.step_mut(step_id) {
              s.status = StepStatus::Failed;
            }
          }
          warn!(
            execution_id = %execution_id,
            step_id = %step_id,
            code = %failure.code,
            "step_failed"
          );
          self.sink.emit(WorkflowEvent::StepFailed {
            execution_id: execution_id.clone(),
            step_id: step_id.clone(),
            reason: failure.message.clone(),
          });
          return DriveOutcome::Failed(failure);
        }
      }
    }

    DriveOutcome::Completed
  }

  /// Run every device operation sequence of one step, in order.
  async fn run_step(
    &self,
    step: &ExecutionStep,
    handle: &ExecutionHandle,
    user: &UserContext,
    options: &ExecutionOptions,
    cancel: &CancellationToken,
    execution_id: &str,
  ) -> Result<(), StepAbort> {
    for sequence in &step.device_operations {
      self
        .run_sequence(step, sequence, handle, user, options, cancel, execution_id)
        .await?;
    }
    Ok(())
  }

  #[allow(clippy::too_many_arguments)]
  async fn run_sequence(
    &self,
    step: &ExecutionStep,
    sequence: &DeviceOperationSequence,
    handle: &ExecutionHandle,
    user: &UserContext,
    options: &ExecutionOptions,
    cancel: &CancellationToken,
    execution_id: &str,
  ) -> Result<(), StepAbort> {
    for operation in &sequence.operations {
      if cancel.is_cancelled() {
        return Err(StepAbort::Cancelled);
      }

      let operation_id = uuid::Uuid::new_v4().to_string();
      {
        let mut execution = handle.write().unwrap();
        if let Some(s) = execution.step_mut(&step.step_id) {
          s.operations.push(OperationExecution {
            operation_id: operation_id.clone(),
            capability: operation.capability.clone(),
            status: OperationStatus::Running,
            retry_attempt: 0,
          });
        }
      }

      if !options.skip_safety_checks {
        let request = OperationRequest {
          operation_id: operation_id.clone(),
          device_id: sequence.device_id.clone(),
          capability: operation.capability.clone(),
          parameters: operation.parameters.clone(),
          priority: options.priority,
        };
        let context = sequence.safety_context.clone().with_user(user.clone());
        let result = self.pipeline.validate(&request, &context).await;

        let emergency_stop = result.has_emergency_stop();
        {
          let mut execution = handle.write().unwrap();
          if let Some(s) = execution.step_mut(&step.step_id) {
            for violation in &result.violations {
              s.warnings
                .push(format!("{}: {}", violation.code, violation.message));
            }
            s.safety_results.push(result);
          }
        }

        if emergency_stop {
          // The pipeline already armed the emergency protocol.
          self.set_operation(handle, &step.step_id, &operation_id, OperationStatus::Failed, 0);
          return Err(StepAbort::Failure(ExecutionFailure::new(
            "SAFETY_VIOLATION",
            format!(
              "operation '{}' on device '{}' blocked by a critical stop-required violation",
              operation.capability, sequence.device_id
            ),
            Severity::Critical,
            false,
          )));
        }
      }

      let command = DeviceCommand {
        command_id: operation_id.clone(),
        execution_id: execution_id.to_string(),
        device_id: sequence.device_id.clone(),
        device_category: sequence.device_category,
        capability: operation.capability.clone(),
        parameters: operation.parameters.clone(),
        expected_result: operation.expected_result.clone(),
      };

      // Bounded iterative retry: 1 + retry_count attempts, linear backoff.
      let mut attempt: u32 = 0;
      loop {
        let result = tokio::time::timeout(
          sequence.timeout,
          self.executor.execute(&command, cancel),
        )
        .await;

        match result {
          Ok(Ok(outcome)) => {
            self.set_operation(
              handle,
              &step.step_id,
              &operation_id,
              OperationStatus::Completed,
              attempt,
            );
            {
              let mut execution = handle.write().unwrap();
              execution.results.push(StepResult {
                step_id: step.step_id.clone(),
                device_id: sequence.device_id.clone(),
                capability: operation.capability.clone(),
                output: outcome.result,
              });
            }
            self.sink.emit(WorkflowEvent::DeviceOperationCompleted {
              execution_id: execution_id.to_string(),
              device_id: sequence.device_id.clone(),
              capability: operation.capability.clone(),
            });
            break;
          }
          Ok(Err(e)) if cancel.is_cancelled() => {
            warn!(operation_id = %operation_id, error = %e, "operation_interrupted_by_cancel");
            return Err(StepAbort::Cancelled);
          }
          Ok(Err(e)) => {
            if attempt < sequence.retry_count {
              attempt += 1;
              warn!(
                operation_id = %operation_id,
                attempt,
                max_retries = sequence.retry_count,
                error = %e,
                "operation_retrying"
              );
              self.set_operation(
                handle,
                &step.step_id,
                &operation_id,
                OperationStatus::Retrying,
                attempt,
              );
              tokio::time::sleep(options.retry_base_delay * attempt).await;
              self.set_operation(
                handle,
                &step.step_id,
                &operation_id,
                OperationStatus::Running,
                attempt,
              );
            } else {
              self.set_operation(
                handle,
                &step.step_id,
                &operation_id,
                OperationStatus::Failed,
                attempt,
              );
              return Err(StepAbort::Failure(ExecutionFailure::new(
                "DEVICE_OPERATION_FAILED",
                format!(
                  "operation '{}' on device '{}' failed after {} attempt(s): {e}",
                  operation.capability,
                  sequence.device_id,
                  attempt + 1
                ),
                Severity::High,
                false,
              )));
            }
          }
          Err(_) => {
            self.set_operation(
              handle,
              &step.step_id,
              &operation_id,
              OperationStatus::Failed,
              attempt,
            );
            return Err(StepAbort::Failure(ExecutionFailure::new(
              "OPERATION_TIMEOUT",
              format!(
                "operation '{}' on device '{}' exceeded its {}ms timeout",
                operation.capability,
                sequence.device_id,
                sequence.timeout.as_millis()
              ),
              Severity::High,
              false,
            )));
          }
        }
      }
    }

    Ok(())
  }

  /// Best-effort rollback for every failed step with a non-empty plan.
  /// A rollback operation failure is logged, never escalated.
  async fn rollback_failed_steps(&self, plan: &CompiledPlan, handle: &ExecutionHandle) {
    let failed_steps: Vec<String> = {
      let execution = handle.read().unwrap();
      execution
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Failed)
        .map(|s| s.step_id.clone())
        .collect()
    };

    for step_id in failed_steps {
      let Some(step) = plan.get_step(&step_id) else {
        continue;
      };
      if step.rollback_plan.is_empty() {
        continue;
      }
      let Some(sequence) = step.device_operations.first() else {
        continue;
      };

      info!(step_id = %step_id, "rollback_started");
      for operation in &step.rollback_plan {
        let command = DeviceCommand {
          command_id: uuid::Uuid::new_v4().to_string(),
          execution_id: handle.read().unwrap().execution_id.clone(),
          device_id: sequence.device_id.clone(),
          device_category: sequence.device_category,
          capability: operation.capability.clone(),
          parameters: operation.parameters.clone(),
          expected_result: None,
        };
        if let Err(e) = self
          .executor
          .execute(&command, &CancellationToken::new())
          .await
        {
          warn!(
            step_id = %step_id,
            capability = %operation.capability,
            error = %e,
            "rollback_operation_failed"
          );
        }
      }
    }
  }

  fn set_operation(
    &self,
    handle: &ExecutionHandle,
    step_id: &str,
    operation_id: &str,
    status: OperationStatus,
    retry_attempt: u32,
  ) {
    let mut execution = handle.write().unwrap();
    if let Some(step) = execution.step_mut(step_id) {
      if let Some(op) = step
        .operations
        .iter_mut()
        .find(|o| o.operation_id == operation_id)
      {
        // Cooperative cancellation wins over in-flight bookkeeping.
        if op.status != OperationStatus::Cancelled {
          op.status = status;
          op.retry_attempt = retry_attempt;
        }
      }
    }
  }

  /// Cancel a running execution.
  ///
  /// Bookkeeping only: running or retrying operations are flipped to
  /// cancelled and the deadline timer is released, but an in-flight device
  /// call is left to finish naturally unless the executor honors the token.
  pub fn cancel_execution(
    &self,
    execution_id: &str,
    reason: &str,
  ) -> Result<(), CoordinatorError> {
    let (handle, cancel) = {
      let executions = self.executions.read().unwrap();
      let entry = executions
        .get(execution_id)
        .ok_or_else(|| CoordinatorError::ExecutionNotFound(execution_id.to_string()))?;
      (entry.execution.clone(), entry.cancel.clone())
    };

    {
      let mut execution = handle.write().unwrap();
      if execution.status != ExecutionStatus::Running {
        return Err(CoordinatorError::NotRunning {
          execution_id: execution_id.to_string(),
          status: format!("{:?}", execution.status).to_lowercase(),
        });
      }
      execution.status = ExecutionStatus::Cancelled;
      for step in &mut execution.steps {
        for op in &mut step.operations {
          if op.status.is_in_flight() {
            op.status = OperationStatus::Cancelled;
          }
        }
      }
    }

    cancel.cancel();
    warn!(execution_id = %execution_id, reason = %reason, "execution_cancelled");
    self.sink.emit(WorkflowEvent::ExecutionCancelled {
      execution_id: execution_id.to_string(),
      reason: reason.to_string(),
    });

    Ok(())
  }

  /// Snapshot of an execution, running or terminal.
  pub fn get_execution(&self, execution_id: &str) -> Option<WorkflowExecution> {
    self
      .executions
      .read()
      .unwrap()
      .get(execution_id)
      .map(|e| e.execution.read().unwrap().clone())
  }

  /// Ids of executions that are still running.
  pub fn active_executions(&self) -> Vec<String> {
    self
      .executions
      .read()
      .unwrap()
      .iter()
      .filter(|(_, e)| e.execution.read().unwrap().status == ExecutionStatus::Running)
      .map(|(id, _)| id.clone())
      .collect()
  }

  /// Drop a terminal execution from the registry.
  pub fn evict_execution(&self, execution_id: &str) -> Result<(), CoordinatorError> {
    let mut executions = self.executions.write().unwrap();
    let entry = executions
      .get(execution_id)
      .ok_or_else(|| CoordinatorError::ExecutionNotFound(execution_id.to_string()))?;
    if !entry.execution.read().unwrap().status.is_terminal() {
      return Err(CoordinatorError::StillRunning(execution_id.to_string()));
    }
    executions.remove(execution_id);
    Ok(())
  }

  /// Cache a compiled plan, keyed by plan id.
  pub fn cache_plan(&self, plan: CompiledPlan) {
    self.plans.write().unwrap().insert(plan.plan_id.clone(), plan);
  }

  /// Fetch a cached plan.
  pub fn get_plan(&self, plan_id: &str) -> Option<CompiledPlan> {
    self.plans.read().unwrap().get(plan_id).cloned()
  }
}
