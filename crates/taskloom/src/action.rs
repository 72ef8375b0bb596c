//! The action plugin boundary.
//!
//! An action is invoked with `(task, context)` and returns either nothing or
//! a value to fold into the context. Actions come in two lanes:
//!
//! - [`BlockingAction`]s run on tokio's blocking pool so a slow call cannot
//!   stall the scheduler.
//! - [`AsyncAction`]s run on the scheduler itself and receive the run's
//!   shared [`Session`].
//!
//! Both are dispatched through [`Action::dispatch`], which yields a
//! [`TaskHandle`] the engine awaits under a timeout.

use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use taskloom_core::{ActionError, Context, Task};
use tokio::task::{JoinError, JoinHandle};

/// What an action hands back: `None` leaves the context untouched.
pub type ActionOutput = Option<Value>;

/// Result of one action invocation.
pub type ActionResult = Result<ActionOutput, ActionError>;

/// A synchronous action.
///
/// Implemented for every `Fn(&Task, &Context) -> ActionResult`.
pub trait BlockingAction: Send + Sync + 'static {
    fn call(&self, task: &Task, ctx: &Context) -> ActionResult;
}

impl<F> BlockingAction for F
where
    F: Fn(&Task, &Context) -> ActionResult + Send + Sync + 'static,
{
    fn call(&self, task: &Task, ctx: &Context) -> ActionResult {
        self(task, ctx)
    }
}

/// An asynchronous action.
///
/// # Examples
///
/// ```
/// use taskloom::prelude::*;
/// use async_trait::async_trait;
/// use serde_json::json;
///
/// struct Echo;
///
/// #[async_trait]
/// impl AsyncAction for Echo {
///     async fn call(&self, task: &Task, _ctx: &Context, _session: &Session) -> ActionResult {
///         Ok(Some(json!({ "echo": task.param("value").cloned() })))
///     }
/// }
///
/// let registry = ActionRegistry::new();
/// registry.register("echo", Action::from_async(Echo));
/// assert!(registry.contains("echo"));
/// ```
#[async_trait]
pub trait AsyncAction: Send + Sync + 'static {
    async fn call(&self, task: &Task, ctx: &Context, session: &Session) -> ActionResult;
}

/// Transport shared by every async action in a run.
///
/// Wraps a [`reqwest::Client`], which pools connections internally and is
/// safe to use from many in-flight actions at once.
#[derive(Debug, Clone, Default)]
pub struct Session {
    http: reqwest::Client,
}

impl Session {
    /// Creates a session with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured HTTP client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// The shared HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

/// Which executor an action runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Tokio's blocking thread pool.
    Blocking,
    /// The cooperative scheduler.
    Async,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Blocking => write!(f, "blocking"),
            Lane::Async => write!(f, "async"),
        }
    }
}

/// A registered action implementation. Cloning is cheap.
#[derive(Clone)]
pub enum Action {
    Blocking(Arc<dyn BlockingAction>),
    Async(Arc<dyn AsyncAction>),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Action").field(&self.lane()).finish()
    }
}

impl Action {
    /// Wraps a closure or function as a blocking action.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&Task, &Context) -> ActionResult + Send + Sync + 'static,
    {
        Action::Blocking(Arc::new(f))
    }

    /// Wraps a [`BlockingAction`] implementor.
    pub fn from_blocking<A: BlockingAction>(action: A) -> Self {
        Action::Blocking(Arc::new(action))
    }

    /// Wraps an [`AsyncAction`] implementor.
    pub fn from_async<A: AsyncAction>(action: A) -> Self {
        Action::Async(Arc::new(action))
    }

    /// The lane this action runs on.
    pub fn lane(&self) -> Lane {
        match self {
            Action::Blocking(_) => Lane::Blocking,
            Action::Async(_) => Lane::Async,
        }
    }

    /// Starts the action on its lane and returns a handle to its result.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, task: Arc<Task>, ctx: Arc<Context>, session: Session) -> TaskHandle {
        let lane = self.lane();
        let inner = match self {
            Action::Blocking(action) => {
                let action = Arc::clone(action);
                tokio::task::spawn_blocking(move || action.call(&task, &ctx))
            }
            Action::Async(action) => {
                let action = Arc::clone(action);
                tokio::spawn(async move { action.call(&task, &ctx, &session).await })
            }
        };
        TaskHandle { inner, lane }
    }
}

/// An in-flight action invocation.
#[derive(Debug)]
pub struct TaskHandle {
    inner: JoinHandle<ActionResult>,
    lane: Lane,
}

impl TaskHandle {
    /// The lane the task was dispatched on.
    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Waits up to `limit` for the action to finish.
    ///
    /// On timeout an async action is aborted; a blocking action keeps its
    /// pool thread until it returns and its result is dropped.
    pub async fn join(mut self, limit: Duration) -> ActionResult {
        match tokio::time::timeout(limit, &mut self.inner).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => Err(ActionError::Aborted(describe_join_error(err))),
            Err(_) => {
                self.inner.abort();
                Err(ActionError::Timeout { after: limit })
            }
        }
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_cancelled() {
        return "cancelled".to_string();
    }
    panic_message(err.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatch(action: &Action) -> TaskHandle {
        action.dispatch(
            Arc::new(Task::new(1, "test")),
            Arc::new(Context::new()),
            Session::new(),
        )
    }

    #[tokio::test]
    async fn test_blocking_action_runs_off_scheduler() {
        let action = Action::blocking(|_task, _ctx| {
            std::thread::sleep(Duration::from_millis(20));
            Ok(Some(json!({"done": true})))
        });
        assert_eq!(action.lane(), Lane::Blocking);

        let output = tokio_test::assert_ok!(dispatch(&action).join(Duration::from_secs(5)).await);
        assert_eq!(output, Some(json!({"done": true})));
    }

    struct Sleepy(Duration);

    #[async_trait]
    impl AsyncAction for Sleepy {
        async fn call(&self, _task: &Task, _ctx: &Context, _session: &Session) -> ActionResult {
            tokio::time::sleep(self.0).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_async_action_times_out() {
        let action = Action::from_async(Sleepy(Duration::from_secs(10)));
        let handle = dispatch(&action);
        assert_eq!(handle.lane(), Lane::Async);

        let err = tokio_test::assert_err!(handle.join(Duration::from_millis(20)).await);
        assert!(matches!(err, ActionError::Timeout { after } if after == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_panicking_action_is_aborted() {
        let action = Action::blocking(|_task, _ctx| -> ActionResult { panic!("kaboom") });
        let result = dispatch(&action).join(Duration::from_secs(5)).await;
        match result {
            Err(ActionError::Aborted(message)) => assert_eq!(message, "panicked: kaboom"),
            other => panic!("expected aborted, got {other:?}"),
        }
    }

    #[test]
    fn test_action_debug_shows_lane() {
        let action = Action::blocking(|_task, _ctx| Ok(None));
        assert_eq!(format!("{action:?}"), "Action(Blocking)");
    }
}
