use crate::action::ActionResult;
use serde_json::json;
use std::fs;
use std::path::Path;
use taskloom_core::{ActionError, Context, Task};

fn path_param(task: &Task) -> Result<&str, ActionError> {
    match task.str_param("path") {
        Some(path) if !path.is_empty() => Ok(path),
        _ => Err(ActionError::MissingParam("path")),
    }
}

fn check_encoding(task: &Task) -> Result<(), ActionError> {
    match task.str_param("encoding") {
        None => Ok(()),
        Some(enc) if enc.eq_ignore_ascii_case("utf-8") || enc.eq_ignore_ascii_case("utf8") => Ok(()),
        Some(enc) => Err(ActionError::invalid_param(
            "encoding",
            format!("unsupported encoding '{enc}', only utf-8 is available"),
        )),
    }
}

/// Reads a UTF-8 file. Returns `{content, path}`.
pub fn file_read(task: &Task, _ctx: &Context) -> ActionResult {
    let path = path_param(task)?;
    check_encoding(task)?;

    let content = fs::read_to_string(path)?;
    Ok(Some(json!({ "content": content, "path": path })))
}

/// Writes `content` to `path`, creating missing parent directories.
/// Returns `{path, bytes_written}`.
pub fn file_write(task: &Task, _ctx: &Context) -> ActionResult {
    let path = path_param(task)?;
    check_encoding(task)?;
    let content = task.str_param("content").unwrap_or_default();

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;

    Ok(Some(json!({ "path": path, "bytes_written": content.len() })))
}
