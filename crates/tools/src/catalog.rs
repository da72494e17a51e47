//! The fixed intent catalog

use std::collections::HashMap;

use careline_core::{ToolCall, ToolDefinition};
use careline_llm::ToolBuilder;
use jsonschema::JSONSchema;
use serde_json::Value;

use crate::intent::Intent;
use crate::ToolsError;

/// Intent names as exposed to the model
pub mod names {
    pub const APPOINTMENT_FLOW: &str = "appointment_flow";
    pub const SUPPORT_FLOW: &str = "support_flow";
    pub const KNOWLEDGE_LOOKUP: &str = "knowledge_lookup";
    pub const SMALL_TALK: &str = "small_talk";
    pub const SYMPTOM_ASSESSMENT: &str = "symptom_assessment";
}

/// Tool definitions plus a compiled argument validator per intent
pub struct IntentCatalog {
    tools: Vec<ToolDefinition>,
    validators: HashMap<String, JSONSchema>,
}

impl std::fmt::Debug for IntentCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentCatalog")
            .field("tools", &self.tools.iter().map(|t| &t.name).collect::<Vec<_>>())
            .finish()
    }
}

impl IntentCatalog {
    pub fn new() -> Result<Self, ToolsError> {
        let tools = definitions();
        let mut validators = HashMap::with_capacity(tools.len());

        for tool in &tools {
            let compiled = JSONSchema::compile(&tool.parameters).map_err(|e| ToolsError::Schema {
                tool: tool.name.clone(),
                message: e.to_string(),
            })?;
            validators.insert(tool.name.clone(), compiled);
        }

        Ok(Self { tools, validators })
    }

    /// Definitions sent with every routing request
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Check arguments against the intent's schema, collecting every violation
    pub fn validate(&self, name: &str, arguments: &Value) -> Result<(), String> {
        let validator = self
            .validators
            .get(name)
            .ok_or_else(|| format!("unknown intent '{}'", name))?;

        validator.validate(arguments).map_err(|errors| {
            errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        })
    }

    /// Decode the model's tool call into an [`Intent`]; never fails
    pub fn decode(&self, call: &ToolCall) -> Intent {
        let arguments: Value = match call.parse_arguments() {
            Ok(value) => value,
            Err(e) => return Intent::unrecognized(&call.name, e.to_string()),
        };

        if let Err(reason) = self.validate(&call.name, &arguments) {
            tracing::debug!(intent = %call.name, %reason, "Tool call failed validation");
            return Intent::unrecognized(&call.name, reason);
        }

        Intent::from_arguments(&call.name, arguments)
    }
}

fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolBuilder::new(
            names::APPOINTMENT_FLOW,
            "Book a new appointment, or reschedule or cancel an existing one",
        )
        // no enum constraint: unknown actions get a usage reply instead of a decode failure
        .param("action", "string", "One of: new, reschedule, cancel", true)
        .build(),
        ToolBuilder::new(
            names::SUPPORT_FLOW,
            "Raise a support request or complaint with the hospital",
        )
        .param("department", "string", "Department the issue concerns, if known", false)
        .build(),
        ToolBuilder::new(
            names::KNOWLEDGE_LOOKUP,
            "Answer questions about the hospital: timings, services, location, doctors, fees",
        )
        .param("query", "string", "The user's question", true)
        .build(),
        ToolBuilder::new(names::SMALL_TALK, "Greetings, thanks and casual conversation")
            .param("message", "string", "The user's message", false)
            .build(),
        ToolBuilder::new(
            names::SYMPTOM_ASSESSMENT,
            "Suggest a specialty and doctors for symptoms the user describes",
        )
        .param("symptoms", "string", "Symptoms in the user's words", true)
        .build(),
    ]
}
