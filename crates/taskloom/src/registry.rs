//! Name → action lookup.

use crate::action::{Action, ActionResult, AsyncAction};
use crate::builtin;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use taskloom_core::{ActionName, Context, Task, TaskError};

/// Mapping from action name to implementation.
///
/// Registering a name that is already bound replaces the previous entry;
/// the last registration wins. Lookups and registrations may interleave
/// freely, so actions can be added while workflows are running.
///
/// # Examples
///
/// ```
/// use taskloom::ActionRegistry;
/// use serde_json::json;
///
/// let registry = ActionRegistry::new();
/// registry.register_fn("answer", |_task, _ctx| Ok(Some(json!({"answer": 42}))));
///
/// assert!(registry.get("answer").is_some());
/// assert!(registry.get("question").is_none());
/// ```
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<ActionName, Action>>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.list())
            .finish()
    }
}

impl ActionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in action.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        builtin::register_builtins(&registry);
        registry
    }

    /// Binds `name` to `action`, returning the entry it replaced.
    pub fn register(&self, name: impl Into<ActionName>, action: Action) -> Option<Action> {
        self.actions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), action)
    }

    /// Registers a closure or function as a blocking action.
    pub fn register_fn<F>(&self, name: impl Into<ActionName>, f: F) -> Option<Action>
    where
        F: Fn(&Task, &Context) -> ActionResult + Send + Sync + 'static,
    {
        self.register(name, Action::blocking(f))
    }

    /// Registers an [`AsyncAction`].
    pub fn register_async<A: AsyncAction>(&self, name: impl Into<ActionName>, action: A) -> Option<Action> {
        self.register(name, Action::from_async(action))
    }

    /// Looks up an action by name.
    pub fn get(&self, name: &str) -> Option<Action> {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Looks up an action, reporting absence as [`TaskError::ActionNotFound`].
    pub fn resolve(&self, name: &ActionName) -> Result<Action, TaskError> {
        self.get(name.as_str())
            .ok_or_else(|| TaskError::ActionNotFound(name.clone()))
    }

    /// Returns `true` if `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// The currently bound names, sorted.
    pub fn list(&self) -> BTreeSet<String> {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .map(|name| name.as_str().to_string())
            .collect()
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no action is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide registry, populated with the built-in actions on first
/// use.
pub fn global() -> Arc<ActionRegistry> {
    static GLOBAL: OnceLock<Arc<ActionRegistry>> = OnceLock::new();
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(ActionRegistry::with_builtins())))
}
