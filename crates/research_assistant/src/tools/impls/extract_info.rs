use crate::tools::tool::{Tool, ToolContext, ToolOutput};
use anyhow::Result;
use llm::ToolDefinition;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractInfoInput {
    pub paper_id: String,
}

pub struct ExtractInfoTool;

impl ExtractInfoTool {
    pub fn schema() -> ToolDefinition {
        ToolDefinition {
            name: "extract_info".to_string(),
            description: "Search for information about a specific paper across all saved topics."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "paper_id": {
                        "type": "string",
                        "description": "The ID of the paper to look for, e.g. 2412.07992v3"
                    }
                },
                "required": ["paper_id"]
            }),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ExtractInfoTool {
    type Input = ExtractInfoInput;

    fn name(&self) -> &'static str {
        "extract_info"
    }

    async fn execute<'a>(&self, context: &ToolContext<'a>, input: Self::Input) -> Result<ToolOutput> {
        info!("Extracting info for paper: {}", input.paper_id);

        if input.paper_id.trim().is_empty() {
            return Ok(ToolOutput::Text("Paper ID cannot be empty.".to_string()));
        }

        let store = context.store.clone();
        let paper_id = input.paper_id.clone();
        let found = tokio::task::spawn_blocking(move || store.find(&paper_id)).await??;

        match found {
            Some((path, record)) => {
                info!("Found paper {} in {}", input.paper_id, path.display());
                match serde_json::to_value(record)? {
                    Value::Object(map) => Ok(ToolOutput::Map(map)),
                    other => Ok(ToolOutput::Text(other.to_string())),
                }
            }
            None => {
                info!("Paper {} not found in any topic directory", input.paper_id);
                Ok(ToolOutput::Text(format!(
                    "No saved information found for paper {}.",
                    input.paper_id
                )))
            }
        }
    }
}
