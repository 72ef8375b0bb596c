//! Run lifecycle notifications.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use taskloom_core::ActionName;

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    Running,
    Completed,
    Failed,
}

impl RunState {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Validating => "validating",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Identifies one run to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    /// Process-unique run number.
    pub id: u64,
    /// Number of tasks in the workflow.
    pub task_count: usize,
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    /// Failed and ended the run.
    Failed,
    /// Failed, but the task set `ignore_errors`.
    Ignored,
}

/// Per-task notification.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub index: usize,
    pub action: ActionName,
    pub outcome: TaskOutcome,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Receives lifecycle callbacks from the engine.
///
/// All methods default to doing nothing. Implementations must be cheap;
/// they are called on the scheduler.
pub trait RunObserver: Send + Sync {
    /// Called once validation has passed and the first task is about to run.
    fn run_started(&self, _run: &RunInfo) {}

    /// Called on every state transition of a started run: `Running`, then
    /// `Completed` or `Failed`.
    ///
    /// `Idle` and `Validating` precede the run and are only logged.
    fn state_changed(&self, _run: &RunInfo, _state: RunState) {}

    /// Called after each task, in task order within a parallel group.
    fn task_finished(&self, _run: &RunInfo, _report: &TaskReport) {}

    /// Called with the terminal state, for every run that started.
    fn run_finished(&self, _run: &RunInfo, _state: RunState, _elapsed: Duration) {}
}

/// In-process counters for runs and tasks.
///
/// # Examples
///
/// ```
/// use taskloom::RunMetrics;
///
/// let metrics = RunMetrics::new();
/// assert_eq!(metrics.snapshot().active_workflows, 0);
/// ```
#[derive(Debug, Default)]
pub struct RunMetrics {
    active_workflows: AtomicI64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    tasks_succeeded: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_ignored: AtomicU64,
}

/// Point-in-time copy of [`RunMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub active_workflows: i64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub tasks_ignored: u64,
}

impl RunMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_workflows: self.active_workflows.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            tasks_succeeded: self.tasks_succeeded.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_ignored: self.tasks_ignored.load(Ordering::Relaxed),
        }
    }
}

impl RunObserver for RunMetrics {
    fn run_started(&self, _run: &RunInfo) {
        self.active_workflows.fetch_add(1, Ordering::Relaxed);
    }

    fn task_finished(&self, _run: &RunInfo, report: &TaskReport) {
        let counter = match report.outcome {
            TaskOutcome::Succeeded => &self.tasks_succeeded,
            TaskOutcome::Failed => &self.tasks_failed,
            TaskOutcome::Ignored => &self.tasks_ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn run_finished(&self, _run: &RunInfo, state: RunState, _elapsed: Duration) {
        self.active_workflows.fetch_sub(1, Ordering::Relaxed);
        match state {
            RunState::Completed => self.runs_completed.fetch_add(1, Ordering::Relaxed),
            _ => self.runs_failed.fetch_add(1, Ordering::Relaxed),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: TaskOutcome) -> TaskReport {
        TaskReport {
            index: 1,
            action: ActionName::new("noop"),
            outcome,
            duration: Duration::from_millis(1),
            error: None,
        }
    }

    #[test]
    fn test_metrics_track_lifecycle() {
        let metrics = RunMetrics::new();
        let run = RunInfo { id: 1, task_count: 3 };

        metrics.run_started(&run);
        assert_eq!(metrics.snapshot().active_workflows, 1);

        metrics.task_finished(&run, &report(TaskOutcome::Succeeded));
        metrics.task_finished(&run, &report(TaskOutcome::Ignored));
        metrics.task_finished(&run, &report(TaskOutcome::Failed));
        metrics.run_finished(&run, RunState::Failed, Duration::ZERO);

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                active_workflows: 0,
                runs_completed: 0,
                runs_failed: 1,
                tasks_succeeded: 1,
                tasks_failed: 1,
                tasks_ignored: 1,
            }
        );
    }

    #[test]
    fn test_run_state() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert_eq!(RunState::Validating.to_string(), "validating");
    }
}
