use crate::tools::registry::FunctionTool;
use crate::tools::types::{PropertySchema, ToolDefinition, ToolInputSchema, ToolResult};
use std::collections::HashMap;

/// Echoes its input back. Mostly useful for verifying the tool path end
/// to end against a live backend.
pub fn echo_tool() -> FunctionTool {
    let mut props = HashMap::new();
    props.insert(
        "text".to_string(),
        PropertySchema::string("The exact text to echo back"),
    );
    let definition = ToolDefinition {
        name: "echo".to_string(),
        description: "Echo the provided text back verbatim. A diagnostic tool.".to_string(),
        input_schema: ToolInputSchema::new(props, vec!["text".to_string()]),
    };
    FunctionTool::new(definition, |params| {
        match params.get("text").and_then(|v| v.as_str()) {
            Some(text) => ToolResult::success(text),
            None => ToolResult::error("Missing required parameter 'text'"),
        }
    })
    .with_areas(&["diagnostics"])
}
