//! A declarative task runner.
//!
//! A workflow is a list of tasks. Each task names an action from an
//! [`ActionRegistry`]; the action reads its parameters (rendered through
//! `{{ path }}` templates) and the shared [`Context`], and its result is
//! merged back so later tasks can use it. Consecutive tasks marked
//! `parallel` run concurrently and join before the next task starts.
//!
//! # Example
//!
//! ```rust,no_run
//! use taskloom::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = ActionRegistry::with_builtins();
//!     registry.register_fn("lookup_user", |_task, _ctx| {
//!         Ok(Some(json!({"user": {"name": "Ann"}})))
//!     });
//!
//!     let workflow = taskloom::load::parse_workflow(
//!         r#"
//! tasks:
//!   - action: lookup_user
//!   - action: print_message
//!     message: "Hello {{ user.name | default('World') }}"
//! "#,
//!     )
//!     .expect("valid workflow");
//!
//!     let engine = Engine::new(Arc::new(registry), EngineConfig::default());
//!     let ctx = engine.execute(&workflow).await.expect("workflow failed");
//!     assert_eq!(ctx.get("message"), Some(&json!("Hello Ann")));
//! }
//! ```

pub mod action;
pub mod builtin;
pub mod config;
mod engine;
pub mod load;
pub mod observe;
pub mod registry;

pub use taskloom_core::*;

pub use action::{Action, ActionOutput, ActionResult, AsyncAction, BlockingAction, Lane, Session, TaskHandle};
pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use observe::{MetricsSnapshot, RunInfo, RunMetrics, RunObserver, RunState, TaskOutcome, TaskReport};
pub use registry::ActionRegistry;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Action, ActionError, ActionName, ActionRegistry, ActionResult, AsyncAction, BlockingAction,
        Context, Engine, EngineConfig, RunObserver, Session, Task, Workflow, WorkflowError,
    };
}
