//! Plugins that ship with the crate.

use crate::plugins::{Plugin, PluginContext, PluginDescriptor, PluginDispatcher, PluginResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// Lists every registered slash command.
pub struct HelpPlugin;

#[async_trait]
impl Plugin for HelpPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new("help", "List available commands")
            .with_triggers(&["help", "commands"])
            .with_group("builtin")
    }

    async fn execute(
        &self,
        _query: &str,
        _media: &[String],
        context: &PluginContext,
    ) -> PluginResponse {
        let mut lines = vec!["Available commands:".to_string()];
        for descriptor in &context.plugin_listing {
            let trigger = format!("/{}", descriptor.triggers.join(", /"));
            lines.push(format!("{:.<24} {}", trigger, descriptor.description));
        }
        PluginResponse::text(lines.join("\n"))
    }
}

/// Shows the tool capability matrix and current availability.
pub struct ToolsPlugin;

#[async_trait]
impl Plugin for ToolsPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new("tools", "Show available tools and whether tool calling is active")
            .with_triggers(&["tools", "functions"])
            .with_group("builtin")
    }

    async fn execute(
        &self,
        _query: &str,
        _media: &[String],
        context: &PluginContext,
    ) -> PluginResponse {
        let manager = &context.tool_manager;
        if !manager.is_enabled() {
            return PluginResponse::text("Tool calling is disabled by configuration.");
        }
        let definitions = manager.registry().definitions();
        if definitions.is_empty() {
            return PluginResponse::text("No tools are registered.");
        }
        let status = if manager.is_available() {
            "active"
        } else {
            "disabled (backend does not support tool calling)"
        };

        let mut lines = vec![format!("Tool calling is {}.", status), String::new()];
        for def in &definitions {
            lines.push(format!("{:.<24} {}", def.name, def.description));
            let mut props: Vec<_> = def.input_schema.properties.iter().collect();
            props.sort_by(|a, b| a.0.cmp(b.0));
            for (name, schema) in props {
                let required = if def.input_schema.required.contains(name) {
                    ", required"
                } else {
                    ""
                };
                lines.push(format!(
                    "    - {} ({}{}): {}",
                    name, schema.schema_type, required, schema.description
                ));
            }
        }

        let matrix = manager.capability_matrix();
        if !matrix.is_empty() {
            lines.push(String::new());
            lines.push("Expertise areas:".to_string());
            lines.push(matrix);
        }
        lines.push(String::new());
        lines.push(format!("{} tool(s) registered.", definitions.len()));
        PluginResponse::text(lines.join("\n"))
    }
}

/// Installs every builtin plugin into the dispatcher.
pub fn register_builtins(dispatcher: &mut PluginDispatcher) {
    dispatcher.register(Arc::new(HelpPlugin));
    dispatcher.register(Arc::new(ToolsPlugin));
}
