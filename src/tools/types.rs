use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Schema for a single tool input property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    pub fn string(description: impl Into<String>) -> Self {
        PropertySchema {
            schema_type: "string".to_string(),
            description: description.into(),
            default: None,
            items: None,
            enum_values: None,
        }
    }

    pub fn number(description: impl Into<String>) -> Self {
        PropertySchema {
            schema_type: "number".to_string(),
            ..PropertySchema::string(description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// JSON-schema shaped input description for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolInputSchema {
    pub fn new(properties: HashMap<String, PropertySchema>, required: Vec<String>) -> Self {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties,
            required,
        }
    }

    pub fn empty() -> Self {
        ToolInputSchema::new(HashMap::new(), Vec::new())
    }
}

/// Complete definition of a tool: name, description, and input schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

impl ToolDefinition {
    /// Render as an OpenAI-style function-tool schema.
    pub fn to_function_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

/// Outcome of a tool execution. `media` holds local file paths the tool
/// produced, to be attached to the follow-up inference call.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub media: Vec<String>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        ToolResult {
            content: content.into(),
            media: Vec::new(),
            is_error: false,
        }
    }

    pub fn success_with_media(content: impl Into<String>, media: Vec<String>) -> Self {
        ToolResult {
            content: content.into(),
            media,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolResult {
            content: message.into(),
            media: Vec::new(),
            is_error: true,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty() || !self.media.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_schema_shape() {
        let mut props = HashMap::new();
        props.insert("query".to_string(), PropertySchema::string("Search terms"));
        let def = ToolDefinition {
            name: "search".to_string(),
            description: "Search the archive for matching entries".to_string(),
            input_schema: ToolInputSchema::new(props, vec!["query".to_string()]),
        };
        let schema = def.to_function_schema();
        assert_eq!(schema["type"], "function");
        assert_eq!(schema["function"]["name"], "search");
        assert_eq!(
            schema["function"]["parameters"]["properties"]["query"]["type"],
            "string"
        );
        assert_eq!(schema["function"]["parameters"]["required"][0], "query");
    }

    #[test]
    fn enum_serializes_under_enum_key() {
        let prop = PropertySchema {
            enum_values: Some(vec!["a".to_string(), "b".to_string()]),
            ..PropertySchema::string("pick one")
        };
        let v = serde_json::to_value(&prop).unwrap();
        assert_eq!(v["enum"][0], "a");
        assert!(v.get("default").is_none());
    }
}
