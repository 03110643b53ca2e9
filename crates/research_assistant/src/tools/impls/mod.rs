mod extract_info;
mod search_papers;

pub use extract_info::ExtractInfoTool;
pub use search_papers::SearchPapersTool;

use super::tool::DynTool;
use llm::ToolDefinition;

/// Schemas advertised to the model, in declaration order
pub fn paper_tool_schemas() -> Vec<ToolDefinition> {
    vec![SearchPapersTool::schema(), ExtractInfoTool::schema()]
}

pub fn paper_tools() -> Vec<Box<dyn DynTool>> {
    vec![Box::new(SearchPapersTool), Box::new(ExtractInfoTool)]
}
