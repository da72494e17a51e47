//! Tool schema construction

use careline_core::ToolDefinition;

/// Builder for creating tool definitions with JSON Schema parameters
///
/// ```ignore
/// let tool = ToolBuilder::new("appointment_flow", "Start, reschedule or cancel an appointment")
///     .param("action", "string", "What to do", true)
///     .string_enum("action", &["new", "reschedule", "cancel"])
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ToolBuilder {
    name: String,
    description: String,
    properties: serde_json::Map<String, serde_json::Value>,
    required: Vec<String>,
}

impl ToolBuilder {
    /// Create a new tool builder
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            properties: serde_json::Map::new(),
            required: Vec::new(),
        }
    }

    /// Add a parameter with type and description
    pub fn param(
        mut self,
        name: impl Into<String>,
        param_type: &str,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        let mut prop = serde_json::Map::new();
        prop.insert("type".to_string(), serde_json::Value::String(param_type.to_string()));
        prop.insert("description".to_string(), serde_json::Value::String(description.into()));

        self.properties.insert(name.clone(), serde_json::Value::Object(prop));

        if required {
            self.required.push(name);
        }
        self
    }

    /// Add enum constraint to an existing string parameter
    pub fn string_enum(mut self, name: &str, values: &[&str]) -> Self {
        if let Some(obj) = self.properties.get_mut(name).and_then(|p| p.as_object_mut()) {
            let enum_values: Vec<serde_json::Value> = values
                .iter()
                .map(|v| serde_json::Value::String(v.to_string()))
                .collect();
            obj.insert("enum".to_string(), serde_json::Value::Array(enum_values));
        }
        self
    }

    /// Build the ToolDefinition
    pub fn build(self) -> ToolDefinition {
        let parameters = serde_json::json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        });

        ToolDefinition::new(self.name, self.description, parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_builder() {
        let tool = ToolBuilder::new("appointment_flow", "Manage appointments")
            .param("action", "string", "new, reschedule or cancel", true)
            .string_enum("action", &["new", "reschedule", "cancel"])
            .param("note", "string", "Optional note", false)
            .build();

        assert_eq!(tool.name, "appointment_flow");
        assert_eq!(tool.parameters["type"], "object");
        assert_eq!(tool.parameters["required"], serde_json::json!(["action"]));
        assert_eq!(
            tool.parameters["properties"]["action"]["enum"],
            serde_json::json!(["new", "reschedule", "cancel"])
        );
    }

    #[test]
    fn test_enum_on_unknown_param_is_ignored() {
        let tool = ToolBuilder::new("t", "d").string_enum("missing", &["a"]).build();
        assert!(tool.parameters["properties"].as_object().unwrap().is_empty());
    }
}
