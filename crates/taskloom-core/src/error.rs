//! Error taxonomy for workflow loading, validation and execution.

use crate::workflow::ActionName;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A malformed workflow document or task.
///
/// Detected before any action runs; always fatal to the run.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    /// The document root is not a mapping.
    #[error("Workflow must be a mapping")]
    NotAMapping,

    /// The document has no `tasks` field.
    #[error("Workflow must contain 'tasks' field")]
    MissingTasks,

    /// `tasks` is present but is not a sequence.
    #[error("Tasks must be a list")]
    TasksNotSequence,

    /// `metadata` is present but is not a mapping.
    #[error("Metadata must be a mapping")]
    MetadataNotMapping,

    /// A task entry is not a mapping.
    #[error("Task {index}: task must be a mapping")]
    TaskNotMapping {
        /// 1-based task position.
        index: usize,
    },

    /// A task has no `action` field.
    #[error("Task {index}: Missing required field: action")]
    MissingAction {
        /// 1-based task position.
        index: usize,
    },

    /// A reserved task field has the wrong type or an out-of-range value.
    #[error("Task {index}: field '{field}' must be {expected}")]
    InvalidField {
        /// 1-based task position.
        index: usize,
        /// The offending field.
        field: &'static str,
        /// What the field should have been.
        expected: &'static str,
    },

    /// Strict validation only: the action is not registered.
    #[error("Task {index}: Unknown action: {action}")]
    UnknownAction {
        /// 1-based task position.
        index: usize,
        /// The unregistered action name.
        action: ActionName,
    },
}

/// Failure reported by an action implementation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ActionError {
    /// Generic failure with a message.
    #[error("{0}")]
    Failed(String),

    /// A required parameter is absent.
    #[error("missing required parameter '{0}'")]
    MissingParam(&'static str),

    /// A parameter is present but unusable.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam {
        /// Parameter name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The action exceeded its time budget.
    #[error("timed out after {after:?}")]
    Timeout {
        /// The budget that was exceeded.
        after: Duration,
    },

    /// An outbound call made by the action failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A remote API answered with an error status.
    #[error("API request failed with status {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body as text.
        body: String,
    },

    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The action panicked or its worker was torn down.
    #[error("action aborted: {0}")]
    Aborted(String),
}

impl ActionError {
    /// Creates a [`ActionError::Failed`] from any message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Wraps a collaborator's error as a transport failure.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn invalid_param(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            name,
            reason: reason.into(),
        }
    }
}

/// Why a single task did not produce a result.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TaskError {
    /// The task references an unregistered action.
    #[error("Action not found: {0}")]
    ActionNotFound(ActionName),

    /// The action ran and failed.
    #[error(transparent)]
    Execution(#[from] ActionError),
}

/// Errors that end a workflow run.
///
/// # Non-Exhaustive
///
/// Match with a wildcard arm:
///
/// ```
/// use taskloom_core::WorkflowError;
///
/// fn report(error: &WorkflowError) {
///     match error {
///         WorkflowError::TaskFailed { index, action, source } => {
///             eprintln!("Task {index} ({action}) failed: {source}");
///         }
///         WorkflowError::Validation(err) => eprintln!("Invalid workflow: {err}"),
///         _ => eprintln!("Error: {error}"),
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkflowError {
    /// The workflow file could not be read.
    #[error("Failed to read workflow file {}: {source}", path.display())]
    Load {
        /// The file that was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The workflow text is not a valid document.
    #[error("Failed to parse workflow: {0}")]
    Parse(String),

    /// The document failed validation; no task ran.
    #[error("Invalid workflow: {0}")]
    Validation(#[from] ValidationError),

    /// A task failed and did not opt into `ignore_errors`.
    #[error("Task {index} ({action}) failed: {source}")]
    TaskFailed {
        /// 1-based task position.
        index: usize,
        /// The action the task invoked.
        action: ActionName,
        /// What went wrong.
        #[source]
        source: TaskError,
    },
}

impl WorkflowError {
    /// Returns the index and action of the task that ended the run, if any.
    pub fn failed_task(&self) -> Option<(usize, &ActionName)> {
        match self {
            WorkflowError::TaskFailed { index, action, .. } => Some((*index, action)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::MissingTasks.to_string(),
            "Workflow must contain 'tasks' field"
        );
        assert_eq!(
            ValidationError::MissingAction { index: 2 }.to_string(),
            "Task 2: Missing required field: action"
        );
        assert_eq!(
            ValidationError::InvalidField {
                index: 1,
                field: "parallel",
                expected: "a boolean",
            }
            .to_string(),
            "Task 1: field 'parallel' must be a boolean"
        );
    }

    #[test]
    fn test_task_failed_display() {
        let error = WorkflowError::TaskFailed {
            index: 2,
            action: ActionName::new("http_request"),
            source: TaskError::Execution(ActionError::Timeout {
                after: Duration::from_secs(5),
            }),
        };
        assert_eq!(
            error.to_string(),
            "Task 2 (http_request) failed: timed out after 5s"
        );
        assert_eq!(error.failed_task(), Some((2, &ActionName::new("http_request"))));
    }

    #[test]
    fn test_action_not_found_display() {
        let error = TaskError::ActionNotFound("missing".into());
        assert_eq!(error.to_string(), "Action not found: missing");
    }

    #[test]
    fn test_failed_task_absent_for_validation() {
        let error = WorkflowError::from(ValidationError::TasksNotSequence);
        assert!(error.failed_task().is_none());
        assert_eq!(error.to_string(), "Invalid workflow: Tasks must be a list");
    }
}
