use crate::action::{ActionResult, AsyncAction, Session};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::{json, Value};
use taskloom_core::{template, ActionError, Context, Task};
use tracing::debug;

/// Generic HTTP call.
///
/// Fields: `url` (required), `method` (default `GET`), `headers` (mapping;
/// values are rendered against the context), `data` (JSON request body).
/// Returns `{status_code, content, json}`; `json` is the decoded body when
/// the response declares a JSON content type and `null` otherwise.
///
/// Any HTTP status is a success. Connection and protocol failures are
/// [`ActionError::Transport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpRequest;

impl HttpRequest {
    fn method(task: &Task) -> Result<Method, ActionError> {
        let name = task.str_param("method").unwrap_or("GET").to_ascii_uppercase();
        Method::from_bytes(name.as_bytes())
            .map_err(|_| ActionError::invalid_param("method", format!("'{name}' is not an HTTP method")))
    }
}

#[async_trait]
impl AsyncAction for HttpRequest {
    async fn call(&self, task: &Task, ctx: &Context, session: &Session) -> ActionResult {
        let url = match task.str_param("url") {
            Some(url) if !url.is_empty() => url,
            _ => return Err(ActionError::MissingParam("url")),
        };
        let method = Self::method(task)?;
        debug!("{} {}", method, url);

        let mut request = session.http().request(method, url);
        match task.param("headers") {
            None | Some(Value::Null) => {}
            Some(Value::Object(headers)) => {
                for (name, value) in headers {
                    let value = match value {
                        Value::String(s) => template::render(s, ctx),
                        other => template::stringify(other),
                    };
                    request = request.header(name.as_str(), value);
                }
            }
            Some(_) => return Err(ActionError::invalid_param("headers", "expected a mapping")),
        }
        if let Some(data) = task.param("data").filter(|d| !d.is_null()) {
            request = request.json(data);
        }

        let response = request.send().await.map_err(ActionError::transport)?;
        let status = response.status().as_u16();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        let content = response.text().await.map_err(ActionError::transport)?;
        let body = if is_json {
            serde_json::from_str(&content).unwrap_or(Value::Null)
        } else {
            Value::Null
        };

        Ok(Some(json!({
            "status_code": status,
            "content": content,
            "json": body,
        })))
    }
}
