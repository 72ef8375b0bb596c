//! Workflow document validation and task sanitization.

use crate::error::ValidationError;
use crate::workflow::{ActionName, Task, Workflow};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::time::Duration;

/// Longest string, in characters, a task field may carry after sanitizing.
pub const MAX_FIELD_CHARS: usize = 10_000;

/// Removes NUL characters and truncates to [`MAX_FIELD_CHARS`].
///
/// ```
/// use taskloom_core::validate::sanitize_string;
///
/// assert_eq!(sanitize_string("a\0b"), "ab");
/// assert_eq!(sanitize_string(&"x".repeat(20_000)).chars().count(), 10_000);
/// ```
pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '\0')
        .take(MAX_FIELD_CHARS)
        .collect()
}

/// Checks a raw workflow document and turns it into a [`Workflow`].
///
/// By default any action name is accepted; unregistered actions are
/// reported when the engine reaches them. [`with_known_actions`] switches
/// to rejecting them up front.
///
/// [`with_known_actions`]: WorkflowValidator::with_known_actions
#[derive(Debug, Clone, Default)]
pub struct WorkflowValidator {
    known_actions: Option<BTreeSet<String>>,
}

impl WorkflowValidator {
    /// Creates a lenient validator that accepts any action name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects tasks whose action is not in `actions`.
    pub fn with_known_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_actions = Some(actions.into_iter().map(Into::into).collect());
        self
    }

    /// Validates `document`, returning the typed workflow.
    ///
    /// Task indexes in errors are 1-based.
    pub fn validate(&self, document: &Value) -> Result<Workflow, ValidationError> {
        let root = document.as_object().ok_or(ValidationError::NotAMapping)?;

        let raw_tasks = root.get("tasks").ok_or(ValidationError::MissingTasks)?;
        let raw_tasks = raw_tasks
            .as_array()
            .ok_or(ValidationError::TasksNotSequence)?;

        let metadata = match root.get("metadata") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(ValidationError::MetadataNotMapping),
        };

        let tasks = raw_tasks
            .iter()
            .enumerate()
            .map(|(i, raw)| self.validate_task(i + 1, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Workflow { metadata, tasks })
    }

    fn validate_task(&self, index: usize, raw: &Value) -> Result<Task, ValidationError> {
        let fields = raw
            .as_object()
            .ok_or(ValidationError::TaskNotMapping { index })?;

        let mut fields: Map<String, Value> = fields
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => Value::String(sanitize_string(s)),
                    other => other.clone(),
                };
                (key.clone(), value)
            })
            .collect();

        let action = match fields.remove("action") {
            None | Some(Value::Null) => return Err(ValidationError::MissingAction { index }),
            Some(Value::String(name)) => ActionName::new(name),
            Some(_) => return Err(invalid(index, "action", "a string")),
        };
        if let Some(known) = &self.known_actions {
            if !known.contains(action.as_str()) {
                return Err(ValidationError::UnknownAction { index, action });
            }
        }

        let save_as = match fields.remove("save_as") {
            None | Some(Value::Null) => None,
            Some(Value::String(key)) if !key.is_empty() => Some(key),
            Some(_) => return Err(invalid(index, "save_as", "a non-empty string")),
        };
        let parallel = flag(&mut fields, index, "parallel")?;
        let ignore_errors = flag(&mut fields, index, "ignore_errors")?;
        let timeout = match fields.remove("timeout") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_f64()
                    .filter(|secs| *secs > 0.0)
                    .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                    .ok_or_else(|| invalid(index, "timeout", "a positive number of seconds"))?,
            ),
        };

        Ok(Task {
            index,
            action,
            save_as,
            parallel,
            ignore_errors,
            timeout,
            params: fields,
        })
    }
}

fn flag(
    fields: &mut Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<bool, ValidationError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(_) => Err(invalid(index, field, "a boolean")),
    }
}

fn invalid(index: usize, field: &'static str, expected: &'static str) -> ValidationError {
    ValidationError::InvalidField {
        index,
        field,
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(doc: Value) -> Result<Workflow, ValidationError> {
        WorkflowValidator::new().validate(&doc)
    }

    #[test]
    fn test_valid_workflow() {
        let workflow = validate(json!({
            "metadata": {"name": "demo"},
            "tasks": [
                {"action": "print_message", "message": "hi", "save_as": "greeting"},
                {"action": "http_request", "parallel": true, "ignore_errors": true, "timeout": 1.5},
            ]
        }))
        .expect("valid workflow");

        assert_eq!(workflow.metadata.get("name"), Some(&json!("demo")));
        assert_eq!(workflow.tasks.len(), 2);

        let first = &workflow.tasks[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.action, "print_message");
        assert_eq!(first.save_as.as_deref(), Some("greeting"));
        assert_eq!(first.str_param("message"), Some("hi"));
        assert!(first.param("action").is_none());

        let second = &workflow.tasks[1];
        assert!(second.parallel);
        assert!(second.ignore_errors);
        assert_eq!(second.timeout, Some(Duration::from_millis(1500)));
        assert!(second.params.is_empty());
    }

    #[test]
    fn test_empty_task_list_is_valid() {
        let workflow = validate(json!({"tasks": []})).expect("valid workflow");
        assert!(workflow.tasks.is_empty());
        assert!(workflow.metadata.is_empty());
    }

    #[test]
    fn test_missing_tasks() {
        assert_eq!(validate(json!({"metadata": {}})), Err(ValidationError::MissingTasks));
    }

    #[test]
    fn test_tasks_not_a_list() {
        assert_eq!(
            validate(json!({"tasks": {"action": "x"}})),
            Err(ValidationError::TasksNotSequence)
        );
    }

    #[test]
    fn test_document_not_a_mapping() {
        assert_eq!(validate(json!(["tasks"])), Err(ValidationError::NotAMapping));
    }

    #[test]
    fn test_missing_action_reports_one_based_index() {
        let err = validate(json!({
            "tasks": [{"action": "a"}, {"message": "no action"}]
        }))
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingAction { index: 2 });
        assert_eq!(err.to_string(), "Task 2: Missing required field: action");
    }

    #[test]
    fn test_reserved_field_types() {
        let cases = [
            (json!({"action": 3}), "action"),
            (json!({"action": "a", "parallel": "yes"}), "parallel"),
            (json!({"action": "a", "ignore_errors": 1}), "ignore_errors"),
            (json!({"action": "a", "save_as": ""}), "save_as"),
            (json!({"action": "a", "timeout": -1}), "timeout"),
            (json!({"action": "a", "timeout": "soon"}), "timeout"),
        ];
        for (task, field) in cases {
            match validate(json!({"tasks": [task]})) {
                Err(ValidationError::InvalidField { index: 1, field: f, .. }) => {
                    assert_eq!(f, field)
                }
                other => panic!("expected invalid {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_metadata_must_be_mapping() {
        assert_eq!(
            validate(json!({"metadata": "x", "tasks": []})),
            Err(ValidationError::MetadataNotMapping)
        );
        assert!(validate(json!({"metadata": null, "tasks": []})).is_ok());
    }

    #[test]
    fn test_sanitizes_string_fields() {
        let long = "y".repeat(MAX_FIELD_CHARS + 50);
        let workflow = validate(json!({
            "tasks": [{"action": "print\0_message", "message": "a\0b", "body": long}]
        }))
        .expect("valid workflow");

        let task = &workflow.tasks[0];
        assert_eq!(task.action, "print_message");
        assert_eq!(task.str_param("message"), Some("ab"));
        assert_eq!(
            task.str_param("body").map(|s| s.chars().count()),
            Some(MAX_FIELD_CHARS)
        );
    }

    #[test]
    fn test_known_actions() {
        let validator = WorkflowValidator::new().with_known_actions(["print_message"]);
        assert!(validator
            .validate(&json!({"tasks": [{"action": "print_message"}]}))
            .is_ok());
        assert_eq!(
            validator.validate(&json!({"tasks": [{"action": "nope"}]})),
            Err(ValidationError::UnknownAction {
                index: 1,
                action: "nope".into(),
            })
        );
    }
}
