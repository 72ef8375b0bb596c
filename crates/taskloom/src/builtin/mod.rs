//! Actions available to every workflow.
//!
//! | name | lane |
//! |---|---|
//! | `print_message` | blocking |
//! | `file_read` | blocking |
//! | `file_write` | blocking |
//! | `http_request` | async |
//! | `chat_completion` | async |

mod chat;
mod file;
mod http;
mod print;

pub use chat::{ChatCompletion, ChatSettings, DEFAULT_API_KEY, DEFAULT_API_URL, DEFAULT_MODEL};
pub use file::{file_read, file_write};
pub use http::HttpRequest;
pub use print::{print_message, Style};

use crate::action::Action;
use crate::registry::ActionRegistry;
use tracing::debug;

/// Registers every built-in action on `registry`.
///
/// Existing entries with the same names are replaced.
pub fn register_builtins(registry: &ActionRegistry) {
    registry.register("print_message", Action::blocking(print_message));
    registry.register("file_read", Action::blocking(file_read));
    registry.register("file_write", Action::blocking(file_write));
    registry.register("http_request", Action::from_async(HttpRequest));
    registry.register("chat_completion", Action::from_async(ChatCompletion::from_env()));
    debug!("Registered built-in actions");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtins_lanes() {
        let registry = ActionRegistry::new();
        register_builtins(&registry);

        assert_eq!(registry.len(), 5);
        let lane = |name: &str| registry.get(name).map(|a| a.lane());
        assert_eq!(lane("print_message"), Some(crate::Lane::Blocking));
        assert_eq!(lane("file_write"), Some(crate::Lane::Blocking));
        assert_eq!(lane("http_request"), Some(crate::Lane::Async));
        assert_eq!(lane("chat_completion"), Some(crate::Lane::Async));
    }
}
