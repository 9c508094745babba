pub mod finalize;

pub use finalize::EMPTY_RESPONSE_TEXT;

use crate::ai::openai::image_to_data_uri;
use crate::ai::types::{clamp_temperature, resolve_temperature, ChatOutcome};
use crate::ai::{ChatBackend, Message};
use crate::history::ThreadHistory;
use crate::tools::{ToolContext, ToolManager, TOOL_RULES};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Greppable marker on user-visible inference failures.
pub const INFERENCE_ERROR_PREFIX: &str = "[inference-error]";

/// One inference request, as handed over by the router.
#[derive(Debug, Clone, Default)]
pub struct InferenceRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub username: String,
    /// Local paths of images attached to the user turn.
    pub media: Vec<String>,
    /// Raw temperature override; non-numeric values fall back to the
    /// backend default.
    pub temperature: Option<Value>,
    pub use_tools: bool,
    pub conversation_id: Option<String>,
    /// Structured output format, e.g. `json`.
    pub format: Option<String>,
}

impl InferenceRequest {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        InferenceRequest {
            prompt: prompt.into(),
            use_tools: true,
            ..InferenceRequest::default()
        }
    }
}

/// What a turn produces: the reply text and any tool-generated images,
/// carried as a side channel distinct from the text.
#[derive(Debug, Clone, Default)]
pub struct InferenceOutcome {
    pub text: String,
    pub media: Vec<String>,
}

/// Drives the fixed two-round tool exchange against the backend:
/// compose, first call, an optional tool round with exactly one
/// follow-up call, then finalize. Never more than two model calls per
/// turn, and errors come back as text rather than propagating.
pub struct InferenceOrchestrator {
    backend: Arc<dyn ChatBackend>,
    tool_manager: Arc<ToolManager>,
    history: Option<Arc<dyn ThreadHistory>>,
    tool_call_temperature: f64,
    media_dir: String,
}

impl InferenceOrchestrator {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        tool_manager: Arc<ToolManager>,
        tool_call_temperature: f64,
        media_dir: impl Into<String>,
    ) -> Self {
        InferenceOrchestrator {
            backend,
            tool_manager,
            history: None,
            tool_call_temperature: clamp_temperature(tool_call_temperature),
            media_dir: media_dir.into(),
        }
    }

    pub fn with_history(mut self, history: Arc<dyn ThreadHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Runs one full turn. Always returns an outcome; backend failures
    /// surface as a fixed-prefix error string in the text slot.
    pub async fn run_inference(&self, request: InferenceRequest) -> InferenceOutcome {
        // A leading `!` suppresses system-prompt augmentation for this
        // turn only.
        let trimmed = request.prompt.trim_start();
        let (augment, user_text) = match trimmed.strip_prefix('!') {
            Some(rest) => (false, rest.trim_start()),
            None => (true, trimmed),
        };

        let tools_offered = request.use_tools && self.tool_manager.is_available();
        let creative_temperature = resolve_temperature(
            request.temperature.as_ref(),
            self.backend.default_temperature(),
        );

        let mut messages = self
            .compose(&request, user_text, augment, tools_offered)
            .await;

        // First call. Tool selection runs near-deterministic; a plain
        // reply uses the turn's creative temperature directly.
        let first_temperature = if tools_offered {
            self.tool_call_temperature
        } else {
            creative_temperature
        };
        let schemas = if tools_offered {
            Some(self.tool_manager.function_schemas())
        } else {
            None
        };
        log::info!(
            "[ORCH] First call: {} messages, tools {}",
            messages.len(),
            if tools_offered { "offered" } else { "withheld" }
        );

        let first = match self
            .backend
            .chat(
                &messages,
                first_temperature,
                schemas.as_deref(),
                request.format.as_deref(),
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(e) if tools_offered => {
                // Probe whether the failure is tool-specific. A clean
                // retry without schemas drops the support latch for good.
                log::warn!("[ORCH] Tool-bearing call failed ({}); retrying without tools", e);
                match self
                    .backend
                    .chat(
                        &messages,
                        creative_temperature,
                        None,
                        request.format.as_deref(),
                    )
                    .await
                {
                    Ok(outcome) => {
                        self.tool_manager.mark_unsupported();
                        return self.finalize_turn(outcome.content, &[], &request, Vec::new());
                    }
                    Err(retry_err) => return Self::error_outcome(&retry_err.to_string()),
                }
            }
            Err(e) => return Self::error_outcome(&e.to_string()),
        };

        // Branch: no tool requests means the first answer is the answer.
        if first.tool_calls.is_empty() {
            return self.finalize_turn(first.content, &[], &request, Vec::new());
        }

        let (tools_used, tool_media) = self.execute_tools(&first, &mut messages, &request).await;

        // Second call: final answer, never with schemas attached.
        log::info!("[ORCH] Second call after {} tool(s)", tools_used.len());
        let second = match self
            .backend
            .chat(
                &messages,
                creative_temperature,
                None,
                request.format.as_deref(),
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return Self::error_outcome(&e.to_string()),
        };

        self.finalize_turn(second.content, &tools_used, &request, tool_media)
    }

    /// Builds the ordered conversation for this turn: system prompt,
    /// prior history, then the user turn with any image attachments.
    async fn compose(
        &self,
        request: &InferenceRequest,
        user_text: &str,
        augment: bool,
        tools_offered: bool,
    ) -> Vec<Message> {
        let mut messages = Vec::new();

        let mut system = request.system_prompt.clone().unwrap_or_default();
        if tools_offered && augment {
            system.push_str(TOOL_RULES);
            let matrix = self.tool_manager.capability_matrix();
            if !matrix.is_empty() {
                system.push_str("\n\nTool expertise areas:\n");
                system.push_str(&matrix);
            }
        }
        let system = system.trim();
        if !system.is_empty() {
            messages.push(Message::system(system));
        }

        if let (Some(history), Some(conversation_id)) =
            (&self.history, request.conversation_id.as_deref())
        {
            let prior = history.fetch(conversation_id).await;
            if !prior.is_empty() {
                log::debug!(
                    "[ORCH] Prepending {} prior turn(s) from thread {}",
                    prior.len(),
                    conversation_id
                );
            }
            messages.extend(prior);
        }

        let content = if request.username.is_empty() {
            user_text.to_string()
        } else {
            format!("{}: {}", request.username, user_text)
        };
        let image_parts: Vec<String> = request
            .media
            .iter()
            .filter_map(|p| image_to_data_uri(Path::new(p)))
            .collect();
        messages.push(if image_parts.is_empty() {
            Message::user(content)
        } else {
            Message::user_with_images(content, image_parts)
        });

        messages
    }

    /// Runs every requested call sequentially, in model order, appending
    /// the invocation message and one tool-result message per call.
    /// Returns the tool names used and any images the tools produced.
    async fn execute_tools(
        &self,
        first: &ChatOutcome,
        messages: &mut Vec<Message>,
        request: &InferenceRequest,
    ) -> (Vec<String>, Vec<String>) {
        let mut context = ToolContext::new(self.media_dir.as_str());
        if let Some(id) = request.conversation_id.as_deref() {
            context = context.with_conversation(id);
        }

        messages.push(Message::assistant_tool_calls(first.tool_calls.clone()));

        let mut tools_used = Vec::new();
        let mut tool_media = Vec::new();
        for call in &first.tool_calls {
            let result = self.tool_manager.execute_call(call, &context).await;

            let mut content = result.content.clone();
            if !result.media.is_empty() {
                // Most transports cannot carry binary data in a tool
                // result, so the images travel as a count-only note.
                content.push_str(&format!(" [{} image(s) attached]", result.media.len()));
                tool_media.extend(result.media);
            }
            if content.is_empty() {
                content = "(no output)".to_string();
            }
            messages.push(Message::tool_result(call.id.clone(), content));

            if !tools_used.contains(&call.name) {
                tools_used.push(call.name.clone());
            }
        }
        (tools_used, tool_media)
    }

    fn finalize_turn(
        &self,
        text: String,
        tools_used: &[String],
        request: &InferenceRequest,
        media: Vec<String>,
    ) -> InferenceOutcome {
        let structured = request.format.is_some();
        InferenceOutcome {
            text: finalize::finalize(&text, tools_used, structured),
            media,
        }
    }

    fn error_outcome(message: &str) -> InferenceOutcome {
        log::error!("[ORCH] Turn failed: {}", message);
        InferenceOutcome {
            text: format!("{} {}", INFERENCE_ERROR_PREFIX, message),
            media: Vec::new(),
        }
    }
}
