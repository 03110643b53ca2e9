use crate::tools::error::ValidationError;
use crate::tools::tool::{Tool, ToolContext, ToolOutput};
use anyhow::{Context, Result};
use llm::ToolDefinition;
use serde::Deserialize;
use tracing::info;

const MAX_RESULTS_LIMIT: i64 = 20;

fn default_max_results() -> i64 {
    5
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchPapersInput {
    pub topic: String,
    #[serde(default = "default_max_results")]
    pub max_results: i64,
}

pub struct SearchPapersTool;

impl SearchPapersTool {
    pub fn schema() -> ToolDefinition {
        let description = concat!(
            "Search for papers on arXiv based on a topic and store their information.\n",
            "Returns the list of paper IDs found. Their metadata is saved locally and can be ",
            "retrieved with extract_info."
        );
        ToolDefinition {
            name: "search_papers".to_string(),
            description: description.to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "The topic to search for"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results to retrieve (1-20)",
                        "default": 5
                    }
                },
                "required": ["topic"]
            }),
        }
    }
}

#[async_trait::async_trait]
impl Tool for SearchPapersTool {
    type Input = SearchPapersInput;

    fn name(&self) -> &'static str {
        "search_papers"
    }

    async fn execute<'a>(&self, context: &ToolContext<'a>, input: Self::Input) -> Result<ToolOutput> {
        info!(
            "Searching for papers on topic: '{}' (max_results: {})",
            input.topic, input.max_results
        );

        if input.topic.trim().is_empty() {
            return Err(ValidationError::new("Topic cannot be empty").into());
        }
        if !(1..=MAX_RESULTS_LIMIT).contains(&input.max_results) {
            return Err(ValidationError::new("max_results must be between 1 and 20").into());
        }

        let papers = context
            .index
            .search(&input.topic, input.max_results as usize)
            .await
            .with_context(|| format!("ArXiv API error while searching for '{}'", input.topic))?;

        // Partition locks block, keep them off the async workers
        let store = context.store.clone();
        let topic = input.topic.clone();
        let (path, papers) = tokio::task::spawn_blocking(move || {
            store.merge(&topic, &papers).map(|path| (path, papers))
        })
        .await??;
        info!(
            "Successfully found and saved {} papers to {}",
            papers.len(),
            path.display()
        );

        Ok(ToolOutput::List(papers.into_iter().map(|p| p.id).collect()))
    }
}
