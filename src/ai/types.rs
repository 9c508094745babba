use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error from the inference transport layer.
#[derive(Debug, Clone)]
pub struct BackendError {
    pub message: String,
    pub status_code: Option<u16>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        BackendError {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status_code: u16) -> Self {
        BackendError {
            message: message.into(),
            status_code: Some(status_code),
        }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for BackendError {}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One completed chat exchange: the model's text plus any requested tool
/// invocations, in the order the model produced them.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatOutcome {
    pub fn text(content: impl Into<String>) -> Self {
        ChatOutcome {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        ChatOutcome {
            content: content.into(),
            tool_calls,
        }
    }
}

/// Clamp a temperature override into the range the chat-completions API
/// accepts.
pub fn clamp_temperature(t: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    t.clamp(0.0, 2.0)
}

/// Resolve a loosely-typed temperature override against a default.
///
/// Accepts a JSON number or a numeric string; anything else (including a
/// missing value) falls back to the default. The result is always clamped.
pub fn resolve_temperature(raw: Option<&Value>, default: f64) -> f64 {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    clamp_temperature(parsed.unwrap_or(default))
}
