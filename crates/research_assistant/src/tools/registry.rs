use super::error::{RegistryMismatchError, ToolError};
use super::tool::DynTool;
use llm::ToolDefinition;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Immutable mapping from tool names to implementations and their advertised schemas
pub struct ToolRegistry {
    schemas: Vec<ToolDefinition>,
    tools: HashMap<&'static str, Box<dyn DynTool>>,
}

impl ToolRegistry {
    /// Pair schemas with implementations. Every schema needs an implementation
    /// and every implementation needs a schema.
    pub fn new(
        schemas: Vec<ToolDefinition>,
        implementations: Vec<Box<dyn DynTool>>,
    ) -> Result<Self, RegistryMismatchError> {
        let tools: HashMap<&'static str, Box<dyn DynTool>> = implementations
            .into_iter()
            .map(|tool| (tool.name(), tool))
            .collect();

        let schema_names: BTreeSet<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
        let tool_names: BTreeSet<&str> = tools.keys().copied().collect();

        if schema_names != tool_names {
            return Err(RegistryMismatchError {
                missing_in_mapping: schema_names
                    .difference(&tool_names)
                    .map(|name| name.to_string())
                    .collect(),
                missing_in_schemas: tool_names
                    .difference(&schema_names)
                    .map(|name| name.to_string())
                    .collect(),
            });
        }

        debug!("Registered tools: {:?}", tool_names);
        Ok(Self { schemas, tools })
    }

    /// The schemas in declaration order, sent with every model request
    pub fn schemas(&self) -> &[ToolDefinition] {
        &self.schemas
    }

    pub fn available_names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn lookup(&self, name: &str) -> Result<&dyn DynTool, ToolError> {
        self.tools
            .get(name)
            .map(|tool| tool.as_ref())
            .ok_or_else(|| ToolError::NotFound {
                name: name.to_string(),
                available: self.available_names().join(", "),
            })
    }
}
