//! Workflow and task model.

use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Type-safe action name wrapper.
///
/// Tasks reference actions by name and the registry is keyed by it.
///
/// # Examples
///
/// ```
/// use taskloom_core::ActionName;
///
/// let name = ActionName::new("print_message");
/// assert_eq!(name.as_str(), "print_message");
///
/// let name: ActionName = "file_read".into();
/// assert_eq!(name, "file_read");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionName(String);

impl ActionName {
    /// Creates a new ActionName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the action name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActionName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ActionName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ActionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ActionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for ActionName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<str> for ActionName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// One step of a workflow.
///
/// Built by [`WorkflowValidator`](crate::WorkflowValidator); `params` holds
/// every action-specific field.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// 1-based position in the workflow's task list.
    pub index: usize,
    /// The registered action this task invokes.
    pub action: ActionName,
    /// Extra context key that receives the raw action result.
    pub save_as: Option<String>,
    /// Whether the task may run concurrently with adjacent parallel tasks.
    pub parallel: bool,
    /// Whether a failure of this task lets the run continue.
    pub ignore_errors: bool,
    /// Overrides the engine's default per-action timeout.
    pub timeout: Option<Duration>,
    /// Action-specific fields.
    pub params: Map<String, Value>,
}

impl Task {
    /// Creates a task with default flags and no parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use taskloom_core::Task;
    ///
    /// let task = Task::new(1, "http_request")
    ///     .with_param("url", "https://example.com")
    ///     .with_save_as("page")
    ///     .with_parallel(true)
    ///     .with_ignore_errors(true)
    ///     .with_timeout(Duration::from_secs(5));
    ///
    /// assert_eq!(task.str_param("url"), Some("https://example.com"));
    /// assert_eq!(task.save_as.as_deref(), Some("page"));
    /// assert!(task.parallel && task.ignore_errors);
    /// assert_eq!(task.timeout, Some(Duration::from_secs(5)));
    /// ```
    pub fn new(index: usize, action: impl Into<ActionName>) -> Self {
        Self {
            index,
            action: action.into(),
            save_as: None,
            parallel: false,
            ignore_errors: false,
            timeout: None,
            params: Map::new(),
        }
    }

    /// Sets an action parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Binds the raw result under `key` after merging.
    pub fn with_save_as(mut self, key: impl Into<String>) -> Self {
        self.save_as = Some(key.into());
        self
    }

    /// Marks the task as a member of a parallel group.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Records a failure of this task and lets the run continue.
    pub fn with_ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = ignore_errors;
        self
    }

    /// Overrides the engine's default timeout for this task.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns a parameter value.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Returns a parameter as a string slice, if it is a string.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// A contiguous slice of the task list scheduled as a unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment<'a> {
    /// A single task run on its own.
    Sequential(&'a Task),
    /// A maximal run of `parallel: true` tasks, joined before the next segment.
    Parallel(&'a [Task]),
}

/// A validated workflow: metadata plus an ordered task list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workflow {
    /// Opaque metadata, exposed to templates under `workflow`.
    pub metadata: Map<String, Value>,
    /// Tasks in execution order.
    pub tasks: Vec<Task>,
}

impl Workflow {
    /// Creates a workflow from tasks, renumbering them 1..=n.
    pub fn new(tasks: Vec<Task>) -> Self {
        let tasks = tasks
            .into_iter()
            .enumerate()
            .map(|(i, mut task)| {
                task.index = i + 1;
                task
            })
            .collect();
        Self {
            metadata: Map::new(),
            tasks,
        }
    }

    /// Sets the metadata seeded into the context under `workflow`.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns `true` if any task is marked `parallel`.
    pub fn has_parallel_tasks(&self) -> bool {
        self.tasks.iter().any(|t| t.parallel)
    }

    /// Partitions the task list into scheduling segments.
    ///
    /// Every maximal contiguous run of parallel tasks becomes one
    /// [`Segment::Parallel`]; every other task is its own
    /// [`Segment::Sequential`].
    pub fn segments(&self) -> Vec<Segment<'_>> {
        let mut segments = Vec::new();
        let mut start = 0;
        while start < self.tasks.len() {
            if !self.tasks[start].parallel {
                segments.push(Segment::Sequential(&self.tasks[start]));
                start += 1;
                continue;
            }
            let end = self.tasks[start..]
                .iter()
                .position(|t| !t.parallel)
                .map_or(self.tasks.len(), |offset| start + offset);
            segments.push(Segment::Parallel(&self.tasks[start..end]));
            start = end;
        }
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(parallel: bool) -> Task {
        Task::new(0, "noop").with_parallel(parallel)
    }

    #[test]
    fn test_action_name() {
        let name = ActionName::new("test");
        assert_eq!(name.as_str(), "test");
        assert_eq!(name.to_string(), "test");

        let name: ActionName = String::from("other").into();
        assert_eq!(name, "other");
    }

    #[test]
    fn test_new_renumbers_tasks() {
        let workflow = Workflow::new(vec![task(false), task(false), task(true)]);
        let indexes: Vec<_> = workflow.tasks.iter().map(|t| t.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
    }

    #[test]
    fn test_segments_group_contiguous_parallel_runs() {
        let workflow = Workflow::new(vec![
            task(false),
            task(true),
            task(true),
            task(false),
            task(true),
        ]);

        let segments = workflow.segments();
        assert_eq!(segments.len(), 4);
        assert!(matches!(segments[0], Segment::Sequential(t) if t.index == 1));
        match segments[1] {
            Segment::Parallel(group) => {
                assert_eq!(group.iter().map(|t| t.index).collect::<Vec<_>>(), vec![2, 3]);
            }
            other => panic!("expected parallel group, got {other:?}"),
        }
        assert!(matches!(segments[2], Segment::Sequential(t) if t.index == 4));
        assert!(matches!(segments[3], Segment::Parallel(group) if group.len() == 1));
    }

    #[test]
    fn test_segments_empty_workflow() {
        assert!(Workflow::default().segments().is_empty());
        assert!(!Workflow::default().has_parallel_tasks());
    }

    #[test]
    fn test_task_params() {
        let task = Task::new(1, "print_message")
            .with_param("message", "hi")
            .with_param("count", 3);
        assert_eq!(task.str_param("message"), Some("hi"));
        assert_eq!(task.str_param("count"), None);
        assert_eq!(task.param("count"), Some(&Value::from(3)));
    }
}
