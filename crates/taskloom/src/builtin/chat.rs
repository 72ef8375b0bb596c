use crate::action::{ActionResult, AsyncAction, Session};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use taskloom_core::{template, ActionError, Context, Task};
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://mock-api:8000/api/v1";
pub const DEFAULT_API_KEY: &str = "sk-simulated-key";
pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u64 = 150;

const API_URL_VAR: &str = "OPENROUTER_API_URL";
const API_KEY_VAR: &str = "OPENROUTER_API_KEY";

/// Endpoint and credentials for the chat completion backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    /// Base URL; requests go to `{api_url}/chat/completions`.
    pub api_url: String,
    pub api_key: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
        }
    }
}

impl ChatSettings {
    /// Reads `OPENROUTER_API_URL` and `OPENROUTER_API_KEY`, with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            api_url: lookup(API_URL_VAR).unwrap_or(defaults.api_url),
            api_key: lookup(API_KEY_VAR).unwrap_or(defaults.api_key),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    temperature: f64,
    max_tokens: u64,
}

/// OpenAI-style chat completion call.
///
/// Fields: `model`, `messages` (each message's `content` is rendered against
/// the context), `temperature`, `max_tokens`. Returns `{content, response}`
/// where `content` is the first choice's message text and `response` the
/// full decoded reply.
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    settings: ChatSettings,
}

impl ChatCompletion {
    /// Creates the action with explicit settings.
    pub fn new(settings: ChatSettings) -> Self {
        Self { settings }
    }

    /// Creates the action with settings read from the environment.
    pub fn from_env() -> Self {
        Self::new(ChatSettings::from_env())
    }

    /// The endpoint and key this action sends requests with.
    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    fn messages(task: &Task, ctx: &Context) -> Result<Vec<Value>, ActionError> {
        let messages = match task.param("messages") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(messages)) => messages,
            Some(_) => return Err(ActionError::invalid_param("messages", "expected a list")),
        };

        Ok(messages
            .iter()
            .map(|message| {
                let mut message = message.clone();
                if let Some(content) = message.get_mut("content") {
                    *content = template::render_value(content, ctx);
                }
                message
            })
            .collect())
    }
}

#[async_trait]
impl AsyncAction for ChatCompletion {
    async fn call(&self, task: &Task, ctx: &Context, session: &Session) -> ActionResult {
        let request = ChatRequest {
            model: task.str_param("model").unwrap_or(DEFAULT_MODEL),
            messages: Self::messages(task, ctx)?,
            temperature: task
                .param("temperature")
                .and_then(Value::as_f64)
                .unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: task
                .param("max_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_MAX_TOKENS),
        };
        debug!("Chat completion with {} ({} messages)", request.model, request.messages.len());

        let response = session
            .http()
            .post(self.settings.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ActionError::transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ActionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let reply: Value = response.json().await.map_err(ActionError::transport)?;
        let content = reply
            .pointer("/choices/0/message/content")
            .cloned()
            .ok_or_else(|| ActionError::failed("response has no choices[0].message.content"))?;

        Ok(Some(json!({ "content": content, "response": reply })))
    }
}
