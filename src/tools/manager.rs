use crate::ai::types::ToolCall;
use crate::tools::registry::{ToolContext, ToolRegistry};
use crate::tools::types::ToolResult;
use futures_util::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};

/// Rules appended to the system prompt whenever tool schemas are offered.
pub const TOOL_RULES: &str = "\n\nYou have access to tools. Call a tool only \
when the request genuinely needs it; answer directly from your own knowledge \
otherwise. Never invent tool names or parameters that are not listed. After \
tool results arrive, fold them into a natural reply instead of quoting them \
verbatim.";

/// Coordinates tool availability and execution for the inference loop.
///
/// Availability has two gates: a static configuration flag and a runtime
/// support latch. The latch starts open and drops permanently the first
/// time the backend rejects a tool-call request; it never re-arms.
pub struct ToolManager {
    registry: ToolRegistry,
    enabled: bool,
    supported: AtomicBool,
}

impl ToolManager {
    /// Disabled managers keep an empty registry; the tools are simply
    /// never there, not merely hidden.
    pub fn new(registry: ToolRegistry, enabled: bool) -> Self {
        let registry = if enabled {
            registry
        } else {
            if !registry.is_empty() {
                log::info!(
                    "[TOOLS] Tools disabled; dropping {} registered tool(s)",
                    registry.len()
                );
            }
            ToolRegistry::new()
        };
        ToolManager {
            registry,
            enabled,
            supported: AtomicBool::new(true),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True while tools should be offered to the backend.
    pub fn is_available(&self) -> bool {
        self.enabled && !self.registry.is_empty() && self.supported.load(Ordering::SeqCst)
    }

    /// Drops the support latch. One-way: once the backend has rejected
    /// tool calling there is no path back in this process.
    pub fn mark_unsupported(&self) {
        if self.supported.swap(false, Ordering::SeqCst) {
            log::warn!("[TOOLS] Backend rejected tool calling; disabling tools permanently");
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported.load(Ordering::SeqCst)
    }

    /// Function-tool schemas for every registered tool, sorted by name.
    pub fn function_schemas(&self) -> Vec<Value> {
        self.registry
            .definitions()
            .iter()
            .map(|d| d.to_function_schema())
            .collect()
    }

    /// Expertise-area index formatted for a system prompt, one dot-padded
    /// area per line followed by the tools covering it. Empty when no
    /// tool declares any area.
    pub fn capability_matrix(&self) -> String {
        self.registry
            .expertise_index()
            .iter()
            .map(|(area, tools)| format!("{:.<40} {}", area, tools.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Executes a single requested call. Unknown names and panicking tools
    /// both come back as error results so the loop can keep going.
    pub async fn execute_call(&self, call: &ToolCall, context: &ToolContext) -> ToolResult {
        let Some(tool) = self.registry.get(&call.name) else {
            log::warn!("[TOOLS] Model requested unknown tool '{}'", call.name);
            return ToolResult::error(format!("Tool '{}' not found", call.name));
        };

        log::info!("[TOOLS] Executing '{}' ({})", call.name, call.id);
        let outcome = AssertUnwindSafe(tool.execute(call.arguments.clone(), context))
            .catch_unwind()
            .await;

        match outcome {
            Ok(result) => {
                if result.is_error {
                    log::warn!("[TOOLS] '{}' returned error: {}", call.name, result.content);
                }
                result
            }
            Err(_) => {
                log::error!("[TOOLS] '{}' panicked during execution", call.name);
                ToolResult::error(format!("Tool '{}' failed unexpectedly", call.name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registry::test_support::ScriptedTool;
    use crate::tools::registry::Tool;
    use crate::tools::types::{ToolDefinition, ToolInputSchema};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct PanickyTool;

    #[async_trait]
    impl Tool for PanickyTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "boom".to_string(),
                description: "Always panics when executed".to_string(),
                input_schema: ToolInputSchema::empty(),
            }
        }

        async fn execute(&self, _params: Value, _context: &ToolContext) -> ToolResult {
            panic!("boom");
        }
    }

    fn manager_with(tools: Vec<Arc<dyn Tool>>) -> ToolManager {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        ToolManager::new(registry, true)
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: json!({}),
        }
    }

    #[tokio::test]
    async fn executes_registered_tool() {
        let manager = manager_with(vec![Arc::new(ScriptedTool::new(
            "alpha",
            ToolResult::success("done"),
        ))]);
        let context = ToolContext::new("/tmp");
        let result = manager.execute_call(&call("alpha"), &context).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "done");
    }

    #[tokio::test]
    async fn unknown_tool_is_error_result() {
        let manager = manager_with(vec![]);
        let context = ToolContext::new("/tmp");
        let result = manager.execute_call(&call("ghost"), &context).await;
        assert!(result.is_error);
        assert!(result.content.contains("ghost"));
    }

    #[tokio::test]
    async fn panicking_tool_is_contained() {
        let manager = manager_with(vec![Arc::new(PanickyTool)]);
        let context = ToolContext::new("/tmp");
        let result = manager.execute_call(&call("boom"), &context).await;
        assert!(result.is_error);
        assert!(result.content.contains("boom"));
    }

    #[test]
    fn latch_is_one_way() {
        let manager = manager_with(vec![Arc::new(ScriptedTool::new(
            "alpha",
            ToolResult::success("ok"),
        ))]);
        assert!(manager.is_available());
        manager.mark_unsupported();
        assert!(!manager.is_available());
        assert!(!manager.is_supported());
        // A second mark is a no-op.
        manager.mark_unsupported();
        assert!(!manager.is_available());
    }

    #[test]
    fn empty_registry_is_unavailable() {
        let manager = manager_with(vec![]);
        assert!(!manager.is_available());
        assert!(manager.function_schemas().is_empty());
        assert_eq!(manager.capability_matrix(), "");
    }

    #[test]
    fn disabled_by_config_drops_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ScriptedTool::new("alpha", ToolResult::success("ok"))));
        let manager = ToolManager::new(registry, false);
        assert!(!manager.is_available());
        assert!(manager.registry().is_empty());
        assert!(!manager.is_enabled());
    }

    #[test]
    fn capability_matrix_indexes_by_area() {
        let manager = manager_with(vec![
            Arc::new(ScriptedTool::new("beta", ToolResult::success("ok")).with_areas(&["weather"])),
            Arc::new(
                ScriptedTool::new("alpha", ToolResult::success("ok"))
                    .with_areas(&["weather", "news"]),
            ),
        ]);
        let matrix = manager.capability_matrix();
        let lines: Vec<&str> = matrix.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("news..."));
        assert!(lines[0].ends_with("alpha"));
        assert!(lines[1].starts_with("weather..."));
        assert!(lines[1].ends_with("alpha, beta"));
    }

    #[test]
    fn capability_matrix_empty_without_areas() {
        let manager = manager_with(vec![Arc::new(ScriptedTool::new(
            "alpha",
            ToolResult::success("ok"),
        ))]);
        assert_eq!(manager.capability_matrix(), "");
    }
}
