//! Reading workflow documents from YAML.
//!
//! YAML is a superset of JSON, so JSON workflow files load too.

use serde_json::Value;
use std::path::Path;
use taskloom_core::{Workflow, WorkflowError, WorkflowValidator};
use tracing::debug;

/// Parses YAML text into an unvalidated document.
pub fn parse_document(text: &str) -> Result<Value, WorkflowError> {
    serde_yaml::from_str(text).map_err(|e| WorkflowError::Parse(e.to_string()))
}

/// Parses and validates YAML text.
pub fn parse_workflow(text: &str) -> Result<Workflow, WorkflowError> {
    parse_workflow_with(text, &WorkflowValidator::new())
}

/// Parses YAML text and validates it with `validator`.
pub fn parse_workflow_with(text: &str, validator: &WorkflowValidator) -> Result<Workflow, WorkflowError> {
    let document = parse_document(text)?;
    Ok(validator.validate(&document)?)
}

/// Reads a file into an unvalidated document.
pub fn load_document(path: impl AsRef<Path>) -> Result<Value, WorkflowError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| WorkflowError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Loaded {} ({} bytes)", path.display(), text.len());
    parse_document(&text)
}

/// Reads, parses and validates a workflow file.
pub fn load_workflow(path: impl AsRef<Path>) -> Result<Workflow, WorkflowError> {
    load_workflow_with(path, &WorkflowValidator::new())
}

pub fn load_workflow_with(
    path: impl AsRef<Path>,
    validator: &WorkflowValidator,
) -> Result<Workflow, WorkflowError> {
    let document = load_document(path)?;
    Ok(validator.validate(&document)?)
}
