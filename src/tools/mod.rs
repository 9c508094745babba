pub mod builtin;
pub mod manager;
pub mod registry;
pub mod types;

pub use manager::{ToolManager, TOOL_RULES};
pub use registry::{FunctionTool, Tool, ToolContext, ToolRegistry};
pub use types::{PropertySchema, ToolDefinition, ToolInputSchema, ToolResult};
