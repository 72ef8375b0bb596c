use crate::action::ActionResult;
use serde_json::json;
use taskloom_core::{Context, Task};

const RESET: &str = "\x1b[0m";

/// Color applied by `print_message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

impl Style {
    /// Parses a style name. Unknown names fall back to [`Style::Info`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "success" => Style::Success,
            "error" => Style::Error,
            "warning" => Style::Warning,
            _ => Style::Info,
        }
    }

    pub fn ansi(self) -> &'static str {
        match self {
            Style::Success => "\x1b[92m",
            Style::Error => "\x1b[91m",
            Style::Warning => "\x1b[93m",
            Style::Info => "\x1b[94m",
        }
    }

    pub fn paint(self, message: &str) -> String {
        format!("{}{}{}", self.ansi(), message, RESET)
    }
}

/// Prints `message` to stdout in the color named by `style`.
///
/// Returns `{message, style}` with the style as given, even when it was not
/// recognized.
pub fn print_message(task: &Task, _ctx: &Context) -> ActionResult {
    let message = task.str_param("message").unwrap_or_default();
    let style = task.str_param("style").unwrap_or("info");

    println!("{}", Style::from_name(style).paint(message));

    Ok(Some(json!({ "message": message, "style": style })))
}
