use super::error::ToolError;
use anyhow::Result;
use papers::{PaperIndex, PaperStore};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Returned when a tool produces nothing
pub const EMPTY_RESULT: &str = "The operation completed but didn't return any results.";

/// Collaborators available to tools during execution
pub struct ToolContext<'a> {
    /// Remote paper search index
    pub index: &'a dyn PaperIndex,
    /// On-disk paper partitions
    pub store: &'a PaperStore,
}

/// Heterogeneous tool results, flattened into one string for the model
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Nothing,
    List(Vec<String>),
    Map(Map<String, Value>),
    Text(String),
}

impl ToolOutput {
    pub fn format(&self) -> String {
        match self {
            ToolOutput::Nothing => EMPTY_RESULT.to_string(),
            ToolOutput::List(items) => items.join(", "),
            ToolOutput::Map(map) => serde_json::to_string_pretty(map)
                .unwrap_or_else(|e| format!("Failed to format result: {e}")),
            ToolOutput::Text(text) => text.clone(),
        }
    }

    /// Label recorded in `tool_result` audit events
    pub fn kind(&self) -> &'static str {
        match self {
            ToolOutput::Nothing => "none",
            ToolOutput::List(_) => "list",
            ToolOutput::Map(_) => "json",
            ToolOutput::Text(_) => "text",
        }
    }
}

/// Core trait for tools, defining the execution interface
#[async_trait::async_trait]
pub trait Tool: Send + Sync + 'static {
    /// Input type for this tool, decoded from the model's JSON arguments
    type Input: DeserializeOwned + Send;

    fn name(&self) -> &'static str;

    async fn execute<'a>(&self, context: &ToolContext<'a>, input: Self::Input) -> Result<ToolOutput>;
}

/// Type-erased tool interface for storing heterogeneous tools in the registry
#[async_trait::async_trait]
pub trait DynTool: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Decode `arguments` and run the tool
    async fn invoke<'a>(
        &self,
        context: &ToolContext<'a>,
        arguments: &Value,
    ) -> Result<ToolOutput, ToolError>;
}

#[async_trait::async_trait]
impl<T> DynTool for T
where
    T: Tool,
{
    fn name(&self) -> &'static str {
        Tool::name(self)
    }

    async fn invoke<'a>(
        &self,
        context: &ToolContext<'a>,
        arguments: &Value,
    ) -> Result<ToolOutput, ToolError> {
        let input: T::Input =
            serde_json::from_value(arguments.clone()).map_err(|e| ToolError::InvalidArguments {
                tool: Tool::name(self).to_string(),
                message: e.to_string(),
            })?;

        self.execute(context, input)
            .await
            .map_err(|e| ToolError::Execution {
                tool: Tool::name(self).to_string(),
                message: format!("{e:#}"),
            })
    }
}
