use crate::tools::types::{ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Ambient state handed to every tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Directory where tools drop produced media files.
    pub media_dir: PathBuf,
    pub conversation_id: Option<String>,
}

impl ToolContext {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        ToolContext {
            media_dir: media_dir.into(),
            conversation_id: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// A callable tool exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Topic areas this tool covers, used for the capability matrix.
    fn expertise_areas(&self) -> Vec<String> {
        Vec::new()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult;
}

/// A tool backed by a plain function plus a declared schema. Schemas are
/// declared, never inferred from the function's signature.
pub struct FunctionTool {
    definition: ToolDefinition,
    areas: Vec<String>,
    func: Box<dyn Fn(Value) -> ToolResult + Send + Sync>,
}

impl FunctionTool {
    pub fn new(
        definition: ToolDefinition,
        func: impl Fn(Value) -> ToolResult + Send + Sync + 'static,
    ) -> Self {
        FunctionTool {
            definition,
            areas: Vec::new(),
            func: Box::new(func),
        }
    }

    pub fn with_areas(mut self, areas: &[&str]) -> Self {
        self.areas = areas.iter().map(|a| a.to_string()).collect();
        self
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn expertise_areas(&self) -> Vec<String> {
        self.areas.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        (self.func)(params)
    }
}

/// Holds all registered tools, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            tools: HashMap::new(),
        }
    }

    /// Registers a tool, logging validation warnings for weak schemas.
    /// A later registration under the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let definition = tool.definition();
        for warning in validate_definition(&definition) {
            log::warn!("[TOOLS] {}", warning);
        }
        if definition.input_schema.properties.is_empty() {
            log::info!("[TOOLS] Tool '{}' takes no parameters", definition.name);
        }
        if self.tools.contains_key(&definition.name) {
            log::warn!("[TOOLS] Replacing existing tool '{}'", definition.name);
        }
        log::info!("[TOOLS] Registered tool '{}'", definition.name);
        self.tools.insert(definition.name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions sorted by tool name for stable listings.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Expertise area to tool names, sorted on both axes.
    pub fn expertise_index(&self) -> std::collections::BTreeMap<String, Vec<String>> {
        let mut index: std::collections::BTreeMap<String, Vec<String>> =
            std::collections::BTreeMap::new();
        for (name, tool) in &self.tools {
            for area in tool.expertise_areas() {
                index.entry(area).or_default().push(name.clone());
            }
        }
        for names in index.values_mut() {
            names.sort();
        }
        index
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        ToolRegistry::new()
    }
}

/// Schema quality checks. Problems are reported, never fatal; a tool with
/// a thin description still registers.
pub fn validate_definition(definition: &ToolDefinition) -> Vec<String> {
    let mut warnings = Vec::new();
    if definition.description.trim().len() < 10 {
        warnings.push(format!(
            "Tool '{}' has a description under 10 characters; the model may misuse it",
            definition.name
        ));
    }
    for (prop, schema) in &definition.input_schema.properties {
        if schema.description.trim().is_empty() {
            warnings.push(format!(
                "Tool '{}' property '{}' has an empty description",
                definition.name, prop
            ));
        }
    }
    for required in &definition.input_schema.required {
        if !definition.input_schema.properties.contains_key(required) {
            warnings.push(format!(
                "Tool '{}' requires undeclared property '{}'",
                definition.name, required
            ));
        }
    }
    warnings
}
