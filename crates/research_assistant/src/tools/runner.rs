use super::error::ToolError;
use super::registry::ToolRegistry;
use super::tool::{ToolContext, ToolOutput};
use crate::audit::AuditLog;
use llm::ToolDefinition;
use papers::{PaperIndex, PaperStore};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, info};

/// Executes named tools against the registry and formats their results
pub struct ToolRunner {
    registry: ToolRegistry,
    index: Box<dyn PaperIndex>,
    store: PaperStore,
    audit: AuditLog,
}

impl ToolRunner {
    pub fn new(
        registry: ToolRegistry,
        index: Box<dyn PaperIndex>,
        store: PaperStore,
        audit: AuditLog,
    ) -> Self {
        Self {
            registry,
            index,
            store,
            audit,
        }
    }

    pub fn schemas(&self) -> &[ToolDefinition] {
        self.registry.schemas()
    }

    /// Run `name` with `arguments`. Errors are logged and returned, never raised further.
    pub async fn execute(&self, name: &str, arguments: &Value) -> Result<String, ToolError> {
        info!("Executing tool '{}' with args: {}", name, arguments);
        let start = Instant::now();

        let result = self.invoke(name, arguments).await;
        let elapsed = start.elapsed();

        match result {
            Ok(output) => {
                let text = output.format();
                info!("Tool '{}' executed successfully in {:?}", name, elapsed);
                debug!("Tool result: {}", text.chars().take(200).collect::<String>());

                self.audit
                    .log_tool_execution(name, arguments, elapsed, Ok(()));
                self.audit
                    .log_tool_result(name, text.chars().count(), output.kind());
                Ok(text)
            }
            Err(e) => {
                error!("{}", e);
                self.audit
                    .log_tool_execution(name, arguments, elapsed, Err(&e.to_string()));
                Err(e)
            }
        }
    }

    async fn invoke(&self, name: &str, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let tool = self.registry.lookup(name)?;
        let context = ToolContext {
            index: self.index.as_ref(),
            store: &self.store,
        };
        tool.invoke(&context, arguments).await
    }
}
