use crate::ai::ChatBackend;
use crate::media::MediaBackend;
use crate::plugins::{Plugin, PluginContext, PluginDescriptor, PluginResponse};
use crate::tools::ToolManager;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Greppable marker on user-visible plugin failures.
pub const PLUGIN_ERROR_PREFIX: &str = "[plugin-error]";

/// Routes slash commands to registered plugins.
///
/// A message is a command when it starts with `/` followed by a
/// non-whitespace token. Anything else passes through to inference.
pub struct PluginDispatcher {
    plugins: Vec<Arc<dyn Plugin>>,
    triggers: HashMap<String, usize>,
    backend: Arc<dyn ChatBackend>,
    media_backend: Option<Arc<dyn MediaBackend>>,
    tool_manager: Arc<ToolManager>,
}

impl PluginDispatcher {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        media_backend: Option<Arc<dyn MediaBackend>>,
        tool_manager: Arc<ToolManager>,
    ) -> Self {
        PluginDispatcher {
            plugins: Vec::new(),
            triggers: HashMap::new(),
            backend,
            media_backend,
            tool_manager,
        }
    }

    /// Registers a plugin under each of its triggers. A trigger already
    /// claimed by another plugin is skipped with a warning; triggers are
    /// unique across the registry.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        let descriptor = plugin.descriptor();
        let index = self.plugins.len();
        let mut claimed = 0;
        for trigger in &descriptor.triggers {
            if self.triggers.contains_key(trigger) {
                log::warn!(
                    "[PLUGINS] Trigger '{}' already taken; skipping it for '{}'",
                    trigger,
                    descriptor.name
                );
                continue;
            }
            self.triggers.insert(trigger.clone(), index);
            claimed += 1;
        }
        if claimed == 0 {
            log::warn!(
                "[PLUGINS] Plugin '{}' registered with no reachable trigger",
                descriptor.name
            );
        } else {
            log::info!(
                "[PLUGINS] Registered plugin '{}' ({} trigger(s))",
                descriptor.name,
                claimed
            );
        }
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Descriptor snapshot, sorted by plugin name.
    pub fn listing(&self) -> Vec<PluginDescriptor> {
        let mut entries: Vec<PluginDescriptor> =
            self.plugins.iter().map(|p| p.descriptor()).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Splits `/name rest of text` into a command name and its argument
    /// string. Returns `None` when the text is not a command.
    pub fn parse_command(text: &str) -> Option<(&str, &str)> {
        let trimmed = text.trim_start();
        let rest = trimmed.strip_prefix('/')?;
        let name = rest.split_whitespace().next()?;
        if !rest.starts_with(name) {
            return None;
        }
        let args = rest[name.len()..].trim();
        Some((name, args))
    }

    /// Handles a command message, or returns `None` so the caller sends
    /// the text on to inference instead.
    pub async fn dispatch(
        &self,
        text: &str,
        media: &[String],
        conversation_id: Option<&str>,
    ) -> Option<PluginResponse> {
        let (trigger, query) = Self::parse_command(text)?;

        let Some(&index) = self.triggers.get(trigger) else {
            log::info!("[PLUGINS] Unknown command '/{}'", trigger);
            return Some(PluginResponse::text(format!(
                "Plugin {} not found.",
                trigger
            )));
        };
        let plugin = &self.plugins[index];
        let descriptor = plugin.descriptor();

        if descriptor.prompt_required && query.trim().is_empty() {
            return Some(PluginResponse::text(descriptor.empty_query_message));
        }

        let context = PluginContext {
            backend: self.backend.clone(),
            media_backend: self.media_backend.clone(),
            tool_manager: self.tool_manager.clone(),
            plugin_listing: self.listing(),
            conversation_id: conversation_id.map(str::to_string),
        };

        log::info!("[PLUGINS] Running '/{}' as '{}'", trigger, descriptor.name);
        let outcome = AssertUnwindSafe(plugin.execute(query, media, &context))
            .catch_unwind()
            .await;

        let mut response = match outcome {
            Ok(response) => response,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown failure".to_string());
                log::error!("[PLUGINS] Plugin '{}' panicked: {}", descriptor.name, message);
                return Some(PluginResponse::text(format!(
                    "{}: {}",
                    PLUGIN_ERROR_PREFIX, message
                )));
            }
        };

        if descriptor.use_imagegen && !response.skip_media_generation && response.media.is_none() {
            response = self.attach_generated_media(&descriptor, response).await;
        }

        Some(response)
    }

    /// Asks the image backend to illustrate the response. Generation
    /// failure leaves the text response intact.
    async fn attach_generated_media(
        &self,
        descriptor: &PluginDescriptor,
        response: PluginResponse,
    ) -> PluginResponse {
        let Some(media_backend) = &self.media_backend else {
            return response;
        };
        let prompt = response
            .metadata
            .get("imagegen_prompt")
            .and_then(|v| v.as_str())
            .unwrap_or(&response.text)
            .to_string();
        if prompt.trim().is_empty() {
            return response;
        }
        match media_backend.generate(&prompt).await {
            Ok(path) => response.with_media(path),
            Err(e) => {
                log::warn!(
                    "[PLUGINS] Image generation failed for '{}': {}",
                    descriptor.name,
                    e
                );
                response
            }
        }
    }
}
