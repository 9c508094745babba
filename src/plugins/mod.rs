pub mod builtin;
pub mod dispatcher;

pub use dispatcher::{PluginDispatcher, PLUGIN_ERROR_PREFIX};

use crate::ai::ChatBackend;
use crate::media::MediaBackend;
use crate::tools::ToolManager;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Static description of a plugin: how it is addressed and how the
/// dispatcher should treat it. Built once at registration, immutable
/// thereafter.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub name: String,
    /// Command tokens that address this plugin. Unique across the registry.
    pub triggers: Vec<String>,
    pub group: String,
    pub description: String,
    /// When set, an empty query short-circuits to `empty_query_message`
    /// without invoking the executor.
    pub prompt_required: bool,
    /// When set, the dispatcher offers the response text to the image
    /// backend unless the plugin opted out for that invocation.
    pub use_imagegen: bool,
    pub empty_query_message: String,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        PluginDescriptor {
            triggers: vec![name.clone()],
            name,
            group: "general".to_string(),
            description: description.into(),
            prompt_required: false,
            use_imagegen: false,
            empty_query_message: "This command needs a query. Try /help.".to_string(),
        }
    }

    pub fn with_triggers(mut self, triggers: &[&str]) -> Self {
        self.triggers = triggers.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn require_prompt(mut self, empty_query_message: impl Into<String>) -> Self {
        self.prompt_required = true;
        self.empty_query_message = empty_query_message.into();
        self
    }

    pub fn with_imagegen(mut self) -> Self {
        self.use_imagegen = true;
        self
    }
}

/// Canonical executor result: reply text, at most one media path, an
/// opt-out for image generation, and free-form metadata.
#[derive(Debug, Clone, Default)]
pub struct PluginResponse {
    pub text: String,
    pub media: Option<String>,
    pub skip_media_generation: bool,
    pub metadata: HashMap<String, Value>,
}

impl PluginResponse {
    pub fn text(text: impl Into<String>) -> Self {
        PluginResponse {
            text: text.into(),
            ..PluginResponse::default()
        }
    }

    pub fn with_media(mut self, path: impl Into<String>) -> Self {
        self.media = Some(path.into());
        self
    }

    pub fn skip_imagegen(mut self) -> Self {
        self.skip_media_generation = true;
        self
    }
}

/// Collaborators available to a plugin invocation. The plugin listing is
/// a snapshot so plugins can describe each other without holding a
/// reference back into the dispatcher.
#[derive(Clone)]
pub struct PluginContext {
    pub backend: Arc<dyn ChatBackend>,
    pub media_backend: Option<Arc<dyn MediaBackend>>,
    pub tool_manager: Arc<ToolManager>,
    pub plugin_listing: Vec<PluginDescriptor>,
    pub conversation_id: Option<String>,
}

/// A slash-command handler.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn descriptor(&self) -> PluginDescriptor;
    async fn execute(
        &self,
        query: &str,
        media: &[String],
        context: &PluginContext,
    ) -> PluginResponse;
}
