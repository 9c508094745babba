use crate::tools::registry::{Tool, ToolContext};
use crate::tools::types::{PropertySchema, ToolDefinition, ToolInputSchema, ToolResult};
use async_trait::async_trait;
use chrono::{Local, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Reports the current date and time, in local or UTC form.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn definition(&self) -> ToolDefinition {
        let mut props = HashMap::new();
        props.insert(
            "timezone".to_string(),
            PropertySchema {
                enum_values: Some(vec!["local".to_string(), "utc".to_string()]),
                ..PropertySchema::string("Which clock to read, local or utc")
            }
            .with_default(Value::String("local".to_string())),
        );
        ToolDefinition {
            name: "current_time".to_string(),
            description: "Get the current date and time. Use this whenever the user asks \
                          what time or day it is."
                .to_string(),
            input_schema: ToolInputSchema::new(props, Vec::new()),
        }
    }

    fn expertise_areas(&self) -> Vec<String> {
        vec!["current date and time".to_string()]
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        let zone = params
            .get("timezone")
            .and_then(|v| v.as_str())
            .unwrap_or("local");
        let stamp = match zone {
            "utc" => Utc::now().format("%A, %Y-%m-%d %H:%M:%S UTC").to_string(),
            _ => Local::now().format("%A, %Y-%m-%d %H:%M:%S %Z").to_string(),
        };
        ToolResult::success(format!("The current time is {}", stamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn reads_utc_clock() {
        let context = ToolContext::new("/tmp");
        let result = CurrentTimeTool
            .execute(json!({"timezone": "utc"}), &context)
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("UTC"));
    }

    #[tokio::test]
    async fn defaults_to_local() {
        let context = ToolContext::new("/tmp");
        let result = CurrentTimeTool.execute(json!({}), &context).await;
        assert!(result.content.starts_with("The current time is "));
    }
}
