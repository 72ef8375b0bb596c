//! Engine configuration.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Upper bound on concurrently running members of a parallel group.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Largest usable concurrency limit; bounded by the semaphore's permit count.
pub const MAX_CONCURRENCY_LIMIT: usize = Semaphore::MAX_PERMITS;

/// Per-action time budget when a task does not set `timeout`.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

pub const MAX_CONCURRENCY_VAR: &str = "TASKLOOM_MAX_CONCURRENCY";
pub const TASK_TIMEOUT_VAR: &str = "TASKLOOM_TASK_TIMEOUT_SECS";

/// An environment override could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid value '{value}' for {name}: {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub reason: &'static str,
}

/// Settings shared by every run of an [`Engine`](crate::Engine).
///
/// # Examples
///
/// ```
/// use taskloom::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::default()
///     .with_max_concurrency(4)
///     .with_default_timeout(Duration::from_secs(5));
/// assert_eq!(config.max_concurrency, 4);
/// assert!(config.capture_env);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Permits shared by the members of a parallel group. Always at least 1.
    pub max_concurrency: usize,
    /// Timeout applied to tasks that do not set their own.
    pub default_timeout: Duration,
    /// Whether to seed the context's `env` key from the process environment.
    pub capture_env: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            default_timeout: DEFAULT_TASK_TIMEOUT,
            capture_env: true,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TASKLOOM_MAX_CONCURRENCY` and
    /// `TASKLOOM_TASK_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(MAX_CONCURRENCY_VAR) {
            config.max_concurrency = match value.trim().parse::<usize>() {
                Ok(n) if (1..=MAX_CONCURRENCY_LIMIT).contains(&n) => n,
                Ok(n) if n > MAX_CONCURRENCY_LIMIT => {
                    return Err(ConfigError {
                        name: MAX_CONCURRENCY_VAR,
                        value,
                        reason: "exceeds the maximum concurrency limit",
                    })
                }
                _ => {
                    return Err(ConfigError {
                        name: MAX_CONCURRENCY_VAR,
                        value,
                        reason: "expected a positive integer",
                    })
                }
            };
        }

        if let Some(value) = lookup(TASK_TIMEOUT_VAR) {
            config.default_timeout = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|secs| *secs > 0.0)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .ok_or(ConfigError {
                    name: TASK_TIMEOUT_VAR,
                    value,
                    reason: "expected a positive number of seconds",
                })?;
        }

        Ok(config)
    }

    /// Sets the parallel-group concurrency limit, clamped to
    /// `1..=MAX_CONCURRENCY_LIMIT`.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.clamp(1, MAX_CONCURRENCY_LIMIT);
        self
    }

    /// Sets the timeout for tasks that do not set their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Controls whether the process environment is seeded under `env`.
    pub fn with_capture_env(mut self, capture_env: bool) -> Self {
        self.capture_env = capture_env;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).expect("valid config");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_concurrency, 10);
        assert_eq!(config.default_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (MAX_CONCURRENCY_VAR, "3"),
            (TASK_TIMEOUT_VAR, "2.5"),
        ]))
        .expect("valid config");
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.default_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = EngineConfig::from_lookup(lookup(&[(MAX_CONCURRENCY_VAR, "0")])).unwrap_err();
        assert_eq!(err.name, MAX_CONCURRENCY_VAR);

        let err = EngineConfig::from_lookup(lookup(&[(TASK_TIMEOUT_VAR, "never")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value 'never' for TASKLOOM_TASK_TIMEOUT_SECS: expected a positive number of seconds"
        );
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        assert_eq!(EngineConfig::default().with_max_concurrency(0).max_concurrency, 1);
    }

    #[test]
    fn test_oversized_concurrency_rejected() {
        let huge = usize::MAX.to_string();
        let err = EngineConfig::from_lookup(lookup(&[(MAX_CONCURRENCY_VAR, huge.as_str())])).unwrap_err();
        assert_eq!(err.name, MAX_CONCURRENCY_VAR);
        assert_eq!(err.reason, "exceeds the maximum concurrency limit");

        let limit = MAX_CONCURRENCY_LIMIT.to_string();
        let config = EngineConfig::from_lookup(lookup(&[(MAX_CONCURRENCY_VAR, limit.as_str())]))
            .expect("limit itself is accepted");
        assert_eq!(config.max_concurrency, MAX_CONCURRENCY_LIMIT);
    }

    #[test]
    fn test_oversized_concurrency_clamped() {
        let config = EngineConfig::default().with_max_concurrency(usize::MAX);
        assert_eq!(config.max_concurrency, MAX_CONCURRENCY_LIMIT);
    }
}
