//! Core types for the taskloom task runner.
//!
//! This crate has no async runtime dependency. It defines the data a
//! workflow run operates on; the engine that drives it lives in `taskloom`.
//!
//! # Core Types
//!
//! - [`Context`] - Accumulating key/value state shared between tasks
//! - [`template`] - `{{ path | default('x') }}` substitution against a context
//! - [`Workflow`] / [`Task`] - The validated workflow model
//! - [`WorkflowValidator`] - Turns a raw document into a [`Workflow`]
//! - [`WorkflowError`] - Error taxonomy for loading, validation and execution

mod context;
mod error;
pub mod template;
pub mod validate;
mod workflow;

pub use context::{Context, IgnoredFailure, ENV_KEY, WORKFLOW_KEY};
pub use error::{ActionError, TaskError, ValidationError, WorkflowError};
pub use validate::WorkflowValidator;
pub use workflow::{ActionName, Segment, Task, Workflow};
