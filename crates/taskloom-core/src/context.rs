//! Workflow execution context.

use serde_json::{Map, Value};
use std::time::{Duration, Instant};

/// Key under which environment variables are seeded.
pub const ENV_KEY: &str = "env";
/// Key under which workflow metadata is seeded.
pub const WORKFLOW_KEY: &str = "workflow";

/// A task failure that was tolerated because the task set `ignore_errors`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredFailure {
    /// 1-based task position.
    pub index: usize,
    /// The action the task invoked.
    pub action: String,
    /// Rendered error message.
    pub message: String,
}

/// Accumulating key/value state threaded through a workflow run.
///
/// Values are [`serde_json::Value`]s, so a lookup can only ever see a
/// string, number, boolean, mapping, sequence or null.
///
/// # Examples
///
/// ```
/// use taskloom_core::Context;
/// use serde_json::json;
///
/// let mut ctx = Context::new();
/// ctx.insert("user", json!({"name": "Ann", "roles": ["admin"]}));
///
/// assert_eq!(ctx.lookup(&["user", "name"]), Some(&json!("Ann")));
/// assert_eq!(ctx.lookup(&["user", "roles", "0"]), Some(&json!("admin")));
/// assert_eq!(ctx.lookup(&["user", "email"]), None);
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    data: Map<String, Value>,
    ignored: Vec<IgnoredFailure>,
    started_at: Instant,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self {
            data: Map::new(),
            ignored: Vec::new(),
            started_at: Instant::now(),
        }
    }

    /// Creates a context seeded with environment variables under `env` and
    /// workflow metadata under `workflow`.
    pub fn seeded<I, K, V>(env: I, metadata: Map<String, Value>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env: Map<String, Value> = env
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        let mut ctx = Self::new();
        ctx.insert(ENV_KEY, Value::Object(env));
        ctx.insert(WORKFLOW_KEY, Value::Object(metadata));
        ctx
    }

    /// Inserts a value with the given key.
    ///
    /// If the key already exists, the previous value is replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Returns the top-level value for the given key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Walks `path` through nested mappings, starting at the top level.
    ///
    /// A numeric segment indexes into a sequence. Returns `None` if any
    /// segment is missing or the final value is null.
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.data.get(first.as_ref())?;
        for segment in rest {
            let segment = segment.as_ref();
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    /// Merges every key of `map` into the top level; incoming keys win.
    pub fn merge(&mut self, map: Map<String, Value>) {
        for (key, value) in map {
            self.data.insert(key, value);
        }
    }

    /// Returns `true` if the context contains a value for the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns an iterator over all top-level keys.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Returns the number of top-level entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the context contains no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the underlying mapping.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Consumes the context and returns the underlying mapping.
    pub fn into_map(self) -> Map<String, Value> {
        self.data
    }

    /// Records a failure that the run tolerated.
    pub fn record_ignored(&mut self, failure: IgnoredFailure) {
        self.ignored.push(failure);
    }

    /// Failures tolerated so far, in the order they were recorded.
    pub fn ignored_failures(&self) -> &[IgnoredFailure] {
        &self.ignored
    }

    /// Returns the time elapsed since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(data: Map<String, Value>) -> Self {
        Self {
            data,
            ..Self::new()
        }
    }
}
