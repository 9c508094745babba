use crate::ai::types::{clamp_temperature, BackendError, ChatOutcome, ToolCall};
use crate::ai::{ChatBackend, Message};
use crate::config::Config;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

/// Client for OpenAI-compatible chat-completions endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    auth_headers: header::HeaderMap,
    endpoint: String,
    model: Option<String>,
    max_tokens: u32,
    default_temperature: f64,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<WireMessage>,
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: WireContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Plain string for pure text, content-part list when images are attached.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<Value>),
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiClient {
    /// Configuration errors are fatal here, before the worker starts.
    pub fn new(config: &Config) -> Result<Self, String> {
        if config.api_url.trim().is_empty() {
            return Err("Missing chat endpoint URL".to_string());
        }

        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if !config.api_key.is_empty() {
            let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| format!("Invalid API key format: {}", e))?;
            auth_headers.insert(header::AUTHORIZATION, auth_value);
        }

        log::info!(
            "[OPENAI] Endpoint: {} model: {}",
            config.api_url,
            config.model.as_deref().unwrap_or("(endpoint default)")
        );

        Ok(OpenAiClient {
            client: Client::new(),
            auth_headers,
            endpoint: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            default_temperature: clamp_temperature(config.temperature),
        })
    }

    fn to_wire(&self, messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| {
                let content = if m.image_parts.is_empty() {
                    WireContent::Text(m.content.clone())
                } else {
                    // Text part first, then each image as a data-URI part.
                    let mut parts = vec![json!({"type": "text", "text": m.content})];
                    for uri in &m.image_parts {
                        parts.push(json!({"type": "image_url", "image_url": {"url": uri}}));
                    }
                    WireContent::Parts(parts)
                };

                let tool_calls = if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| WireToolCall {
                                id: tc.id.clone(),
                                call_type: "function".to_string(),
                                function: WireFunctionCall {
                                    name: tc.name.clone(),
                                    arguments: serde_json::to_string(&tc.arguments)
                                        .unwrap_or_default(),
                                },
                            })
                            .collect(),
                    )
                };

                WireMessage {
                    role: m.role.as_str().to_string(),
                    content,
                    tool_calls,
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    async fn chat(
        &self,
        messages: &[Message],
        temperature: f64,
        tools: Option<&[Value]>,
        format: Option<&str>,
    ) -> Result<ChatOutcome, BackendError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: self.to_wire(messages),
            temperature: clamp_temperature(temperature),
            max_tokens: self.max_tokens,
            tools: tools.filter(|t| !t.is_empty()).map(|t| t.to_vec()),
            response_format: format.map(|f| match f {
                "json" | "json_object" => json!({"type": "json_object"}),
                other => json!({"type": other}),
            }),
        };

        log::debug!(
            "[OPENAI] Request to {}: {} messages, {} tool schemas",
            self.endpoint,
            request.messages.len(),
            request.tools.as_ref().map(|t| t.len()).unwrap_or(0)
        );

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.auth_headers.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::new(format!("Chat request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorResponse>(&error_text) {
                Ok(parsed) => format!("Endpoint error: {}", parsed.error.message),
                Err(_) => {
                    let truncated: String = error_text.chars().take(200).collect();
                    format!("Endpoint returned status {}: {}", status, truncated)
                }
            };
            return Err(BackendError::with_status(message, status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::new(format!("Failed to read response: {}", e)))?;
        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::new(format!("Failed to parse response: {}", e)))?;

        let choice = parsed
            .choices
            .first()
            .ok_or_else(|| BackendError::new("Endpoint returned no choices"))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .as_ref()
            .map(|calls| {
                calls
                    .iter()
                    .map(|tc| ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        arguments: serde_json::from_str(&tc.function.arguments)
                            .unwrap_or_else(|_| json!({})),
                    })
                    .collect()
            })
            .unwrap_or_default();

        log::debug!(
            "[OPENAI] Response: {} chars, {} tool calls",
            choice.message.content.as_deref().map(|c| c.len()).unwrap_or(0),
            tool_calls.len()
        );

        Ok(ChatOutcome {
            content: choice.message.content.clone().unwrap_or_default(),
            tool_calls,
        })
    }

    fn default_temperature(&self) -> f64 {
        self.default_temperature
    }
}

/// Read a local image and render it as a data URI content part. Returns
/// `None` for missing or non-image files.
pub fn image_to_data_uri(path: &Path) -> Option<String> {
    if !path.is_file() {
        log::warn!("[OPENAI] Media file not found: {}", path.display());
        return None;
    }
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        other => {
            log::warn!(
                "[OPENAI] Skipping non-image media: {} (ext={:?})",
                path.display(),
                other
            );
            return None;
        }
    };
    match std::fs::read(path) {
        Ok(bytes) => Some(format!("data:{};base64,{}", mime, BASE64.encode(bytes))),
        Err(e) => {
            log::warn!("[OPENAI] Failed reading image '{}': {}", path.display(), e);
            None
        }
    }
}
