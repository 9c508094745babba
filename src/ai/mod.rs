pub mod openai;
pub mod types;

pub use openai::OpenAiClient;
pub use types::{clamp_temperature, resolve_temperature, BackendError, ChatOutcome, ToolCall};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// One conversation turn. Built fresh per inference turn by the
/// orchestrator; never persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Data-URI image parts attached to a user turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_parts: Vec<String>,
    /// Tool invocations echoed back on an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Correlates a tool-role turn with the invocation it answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Message {
            role,
            content: content.into(),
            image_parts: Vec::new(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    pub fn user_with_images(content: impl Into<String>, image_parts: Vec<String>) -> Self {
        Message {
            image_parts,
            ..Self::plain(MessageRole::User, content)
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, content)
    }

    /// The assistant turn that carries the model's own tool invocations.
    /// Content must be non-empty: some endpoints reject a missing field.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Message {
            tool_calls,
            ..Self::plain(MessageRole::Assistant, "\n")
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(MessageRole::Tool, content)
        }
    }
}

/// Chat transport collaborator. `tools` carries pre-shaped function-calling
/// schemas; `format` requests a structured output mode (e.g. "json").
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        temperature: f64,
        tools: Option<&[Value]>,
        format: Option<&str>,
    ) -> Result<ChatOutcome, BackendError>;

    /// Temperature used when no per-turn override resolves.
    fn default_temperature(&self) -> f64;
}

#[cfg(test)]
/// What one recorded `chat()` call looked like from the backend's side.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub tool_schemas: Option<Vec<Value>>,
    pub format: Option<String>,
}

#[cfg(test)]
/// Mock backend for tests: returns pre-configured outcomes from a queue and
/// records every call for auditing.
#[derive(Clone, Default)]
pub struct MockBackend {
    responses: Arc<Mutex<VecDeque<Result<ChatOutcome, BackendError>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    default_temperature: f64,
}

#[cfg(test)]
impl MockBackend {
    pub fn new(responses: Vec<Result<ChatOutcome, BackendError>>) -> Self {
        MockBackend {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            calls: Arc::new(Mutex::new(Vec::new())),
            default_temperature: 0.7,
        }
    }

    pub fn with_default_temperature(mut self, t: f64) -> Self {
        self.default_temperature = t;
        self
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ChatBackend for MockBackend {
    async fn chat(
        &self,
        messages: &[Message],
        temperature: f64,
        tools: Option<&[Value]>,
        format: Option<&str>,
    ) -> Result<ChatOutcome, BackendError> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            temperature,
            tool_schemas: tools.map(|t| t.to_vec()),
            format: format.map(|f| f.to_string()),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ChatOutcome::text("(mock exhausted)")))
    }

    fn default_temperature(&self) -> f64 {
        self.default_temperature
    }
}
