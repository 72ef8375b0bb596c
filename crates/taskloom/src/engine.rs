//! Workflow execution engine.
//!
//! A run walks the workflow's [segments](taskloom_core::Workflow::segments)
//! in order. A sequential task is rendered against the current context,
//! invoked, and its result merged before the next segment starts. A
//! parallel group is rendered against one snapshot, fanned out under a
//! semaphore, and joined; its results are merged in task order only after
//! every member has finished.
//!
//! A task failure ends the run unless the task set `ignore_errors`, in which
//! case the failure is recorded on the context and the run continues with
//! the context unchanged by that task.

use crate::action::{ActionOutput, Session};
use crate::config::{EngineConfig, MAX_CONCURRENCY_LIMIT};
use crate::observe::{RunInfo, RunObserver, RunState, TaskOutcome, TaskReport};
use crate::registry::{self, ActionRegistry};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskloom_core::{
    template, ActionError, Context, IgnoredFailure, Segment, Task, TaskError, Workflow,
    WorkflowError, WorkflowValidator,
};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Drives workflows through the registered actions.
///
/// An engine is reusable: each call to [`execute`](Engine::execute) is an
/// independent run with its own [`Context`].
pub struct Engine {
    registry: Arc<ActionRegistry>,
    config: EngineConfig,
    session: Session,
    observers: Vec<Arc<dyn RunObserver>>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("actions", &self.registry.list())
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// A task's result before the failure policy is applied.
struct Attempt {
    result: Result<ActionOutput, TaskError>,
    duration: Duration,
}

impl Engine {
    /// Creates an engine over `registry` with no observers.
    pub fn new(registry: Arc<ActionRegistry>, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            session: Session::new(),
            observers: Vec::new(),
        }
    }

    /// An engine over the process-wide registry.
    pub fn with_global_registry(config: EngineConfig) -> Self {
        Self::new(registry::global(), config)
    }

    /// Replaces the transport handed to async actions.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Adds a lifecycle observer.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// The registry tasks are resolved against.
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// The configuration this engine runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates a raw document, then runs it.
    ///
    /// A document that fails validation produces a single
    /// [`WorkflowError::Validation`]; no context is built and no action runs.
    pub async fn execute_document(&self, document: &Value) -> Result<Context, Vec<WorkflowError>> {
        debug!("Run state: {} -> {}", RunState::Idle, RunState::Validating);
        let workflow = WorkflowValidator::new().validate(document).map_err(|e| {
            warn!("Workflow validation failed: {}", e);
            vec![WorkflowError::from(e)]
        })?;
        self.execute(&workflow).await
    }

    /// Runs `workflow` and returns the final context.
    ///
    /// On failure the errors identify the task(s) that ended the run. A
    /// sequential failure yields exactly one error; a failed parallel group
    /// yields one per failed, non-ignored member, in task order.
    pub async fn execute(&self, workflow: &Workflow) -> Result<Context, Vec<WorkflowError>> {
        self.execute_with(workflow, Map::new()).await
    }

    /// Like [`execute`](Engine::execute), with extra initial context keys.
    ///
    /// `seed` is merged over the `env` and `workflow` entries.
    pub async fn execute_with(
        &self,
        workflow: &Workflow,
        seed: Map<String, Value>,
    ) -> Result<Context, Vec<WorkflowError>> {
        let run = RunInfo {
            id: NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
            task_count: workflow.tasks.len(),
        };
        let mut ctx = Arc::new(self.initial_context(workflow, seed));

        info!("Run {} {} with {} tasks", run.id, RunState::Running, run.task_count);
        for observer in &self.observers {
            observer.run_started(&run);
            observer.state_changed(&run, RunState::Running);
        }

        let started = Instant::now();
        let outcome = self.drive(&run, workflow, &mut ctx).await;
        let elapsed = started.elapsed();

        let state = match &outcome {
            Ok(()) => {
                info!("Run {} {} in {:?}", run.id, RunState::Completed, elapsed);
                RunState::Completed
            }
            Err(errors) => {
                warn!(
                    "Run {} {} in {:?} with {} error(s)",
                    run.id,
                    RunState::Failed,
                    elapsed,
                    errors.len()
                );
                RunState::Failed
            }
        };
        for observer in &self.observers {
            observer.state_changed(&run, state);
            observer.run_finished(&run, state, elapsed);
        }

        outcome?;
        Ok(Arc::try_unwrap(ctx).unwrap_or_else(|shared| (*shared).clone()))
    }

    async fn drive(
        &self,
        run: &RunInfo,
        workflow: &Workflow,
        ctx: &mut Arc<Context>,
    ) -> Result<(), Vec<WorkflowError>> {
        for segment in workflow.segments() {
            match segment {
                Segment::Sequential(task) => {
                    let attempt = run_task(
                        Arc::clone(&self.registry),
                        self.session.clone(),
                        task.clone(),
                        Arc::clone(ctx),
                        self.timeout_for(task),
                    )
                    .await;
                    self.settle(run, task, attempt, ctx).map_err(|e| vec![e])?;
                }
                Segment::Parallel(group) => self.run_parallel(run, group, ctx).await?,
            }
        }
        Ok(())
    }

    async fn run_parallel(
        &self,
        run: &RunInfo,
        group: &[Task],
        ctx: &mut Arc<Context>,
    ) -> Result<(), Vec<WorkflowError>> {
        debug!(
            "Dispatching parallel group of {} task(s) starting at task {}",
            group.len(),
            group.first().map_or(0, |t| t.index)
        );

        let permits = Arc::new(Semaphore::new(
            self.config.max_concurrency.clamp(1, MAX_CONCURRENCY_LIMIT),
        ));
        let handles: Vec<_> = group
            .iter()
            .map(|task| {
                let permits = Arc::clone(&permits);
                let attempt = run_task(
                    Arc::clone(&self.registry),
                    self.session.clone(),
                    task.clone(),
                    Arc::clone(ctx),
                    self.timeout_for(task),
                );
                tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await;
                    attempt.await
                })
            })
            .collect();

        // Join barrier: every member finishes before anything is merged.
        let mut attempts = Vec::with_capacity(handles.len());
        for handle in handles {
            let attempt = match handle.await {
                Ok(attempt) => attempt,
                Err(err) => Attempt {
                    result: Err(TaskError::Execution(ActionError::Aborted(err.to_string()))),
                    duration: Duration::ZERO,
                },
            };
            attempts.push(attempt);
        }

        let errors: Vec<WorkflowError> = group
            .iter()
            .zip(attempts)
            .filter_map(|(task, attempt)| self.settle(run, task, attempt, ctx).err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Applies the result and failure policy of one finished task.
    fn settle(
        &self,
        run: &RunInfo,
        task: &Task,
        attempt: Attempt,
        ctx: &mut Arc<Context>,
    ) -> Result<(), WorkflowError> {
        let Attempt { result, duration } = attempt;
        match result {
            Ok(output) => {
                info!(
                    "Task {} ({}) completed in {:?}",
                    task.index, task.action, duration
                );
                apply_output(ctx, task, output);
                self.notify_task(run, task, TaskOutcome::Succeeded, duration, None);
                Ok(())
            }
            Err(err) if task.ignore_errors => {
                let message = err.to_string();
                warn!(
                    "Task {} ({}) failed, continuing: {}",
                    task.index, task.action, message
                );
                Arc::make_mut(ctx).record_ignored(IgnoredFailure {
                    index: task.index,
                    action: task.action.to_string(),
                    message: message.clone(),
                });
                self.notify_task(run, task, TaskOutcome::Ignored, duration, Some(message));
                Ok(())
            }
            Err(err) => {
                warn!("Task {} ({}) failed: {}", task.index, task.action, err);
                self.notify_task(run, task, TaskOutcome::Failed, duration, Some(err.to_string()));
                Err(WorkflowError::TaskFailed {
                    index: task.index,
                    action: task.action.clone(),
                    source: err,
                })
            }
        }
    }

    fn notify_task(
        &self,
        run: &RunInfo,
        task: &Task,
        outcome: TaskOutcome,
        duration: Duration,
        error: Option<String>,
    ) {
        if self.observers.is_empty() {
            return;
        }
        let report = TaskReport {
            index: task.index,
            action: task.action.clone(),
            outcome,
            duration,
            error,
        };
        for observer in &self.observers {
            observer.task_finished(run, &report);
        }
    }

    fn timeout_for(&self, task: &Task) -> Duration {
        task.timeout.unwrap_or(self.config.default_timeout)
    }

    fn initial_context(&self, workflow: &Workflow, seed: Map<String, Value>) -> Context {
        let env: Vec<(String, String)> = if self.config.capture_env {
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect()
        } else {
            Vec::new()
        };
        let mut ctx = Context::seeded(env, workflow.metadata.clone());
        ctx.merge(seed);
        ctx
    }
}

/// Resolves, renders and invokes one task.
async fn run_task(
    registry: Arc<ActionRegistry>,
    session: Session,
    task: Task,
    ctx: Arc<Context>,
    limit: Duration,
) -> Attempt {
    let started = Instant::now();
    let result = match registry.resolve(&task.action) {
        Ok(action) => {
            let task = Arc::new(render_task(task, &ctx));
            debug!(
                "Dispatching task {} ({}) on the {} lane",
                task.index,
                task.action,
                action.lane()
            );
            action
                .dispatch(task, ctx, session)
                .join(limit)
                .await
                .map_err(TaskError::from)
        }
        Err(err) => Err(err),
    };
    Attempt {
        result,
        duration: started.elapsed(),
    }
}

fn render_task(mut task: Task, ctx: &Context) -> Task {
    task.params = template::render_params(&task.params, ctx);
    task
}

/// Merges a mapping result into the context, then binds `save_as`.
///
/// `save_as` is applied last so it always holds the raw result.
fn apply_output(ctx: &mut Arc<Context>, task: &Task, output: ActionOutput) {
    let Some(value) = output else {
        return;
    };
    let ctx = Arc::make_mut(ctx);
    match (&task.save_as, value) {
        (Some(key), value) => {
            if let Value::Object(map) = &value {
                ctx.merge(map.clone());
            }
            ctx.insert(key.clone(), value);
        }
        (None, Value::Object(map)) => ctx.merge(map),
        (None, _) => {}
    }
}
