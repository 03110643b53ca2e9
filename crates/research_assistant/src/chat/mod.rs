//! Conversation engine: drives one query through model calls and tool round-trips

#[cfg(test)]
mod tests;

use crate::audit::AuditLog;
use crate::tools::ToolRunner;
use crate::ui::{UIError, UIMessage, UserInterface};
use llm::{ContentBlock, LLMProvider, LLMRequest, LLMResponse, Message};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Model API error: {0}")]
    ModelApi(String),

    #[error(transparent)]
    Ui(#[from] UIError),
}

/// How a query ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The model answered with text after `tool_calls` tool round-trips
    Answered { tool_calls: usize },
    /// The model returned no content at all
    EmptyResponse { tool_calls: usize },
    /// Blank query, no model call was made
    EmptyQuery,
}

enum ConversationState {
    AwaitingModel,
    DispatchingTool {
        /// Assistant segments of the current pass, ending with the tool use
        pending: Vec<ContentBlock>,
        id: String,
        name: String,
        input: Value,
    },
    Done(QueryOutcome),
}

pub struct ConversationEngine {
    llm: Box<dyn LLMProvider>,
    runner: ToolRunner,
    ui: Arc<dyn UserInterface>,
    audit: AuditLog,
    model: String,
    max_tokens: u32,
}

impl ConversationEngine {
    pub fn new(
        llm: Box<dyn LLMProvider>,
        runner: ToolRunner,
        ui: Arc<dyn UserInterface>,
        audit: AuditLog,
        model: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            llm,
            runner,
            ui,
            audit,
            model,
            max_tokens,
        }
    }

    /// Process one user query to completion, including all nested tool calls.
    /// The message history lives only for the duration of this call.
    pub async fn process_query(&mut self, query: &str) -> Result<QueryOutcome, ChatError> {
        if query.trim().is_empty() {
            self.ui
                .display(UIMessage::Notice("Please provide a valid query.".to_string()))
                .await?;
            return Ok(QueryOutcome::EmptyQuery);
        }

        info!(
            "Processing query: {}...",
            query.chars().take(100).collect::<String>()
        );
        self.audit.log_user_query(query);

        let mut messages = vec![Message::new_user(query)];
        let mut tool_calls = 0;
        let mut state = ConversationState::AwaitingModel;

        loop {
            state = match state {
                ConversationState::AwaitingModel => {
                    let response = self.call_model(&messages).await?;
                    self.scan_response(response, tool_calls).await?
                }
                ConversationState::DispatchingTool {
                    pending,
                    id,
                    name,
                    input,
                } => {
                    tool_calls += 1;
                    let result = self.dispatch_tool(&name, &input).await?;
                    messages.push(Message::new_assistant_content(pending));
                    messages.push(Message::new_user_content(vec![
                        ContentBlock::new_tool_result(id, result),
                    ]));
                    ConversationState::AwaitingModel
                }
                ConversationState::Done(outcome) => {
                    debug!("Query finished: {:?}", outcome);
                    return Ok(outcome);
                }
            };
        }
    }

    /// Display text segments in order and stop at the first tool use.
    /// Segments after that tool use are not processed.
    async fn scan_response(
        &self,
        response: LLMResponse,
        tool_calls: usize,
    ) -> Result<ConversationState, ChatError> {
        let mut pending = Vec::new();
        let mut tool_use = None;

        for block in response.content {
            match block {
                ContentBlock::Text { text } => {
                    self.ui
                        .display(UIMessage::AssistantText(text.clone()))
                        .await?;
                    pending.push(ContentBlock::Text { text });
                }
                ContentBlock::ToolUse { id, name, input } => {
                    pending.push(ContentBlock::new_tool_use(
                        id.clone(),
                        name.clone(),
                        input.clone(),
                    ));
                    tool_use = Some((id, name, input));
                    break;
                }
                ContentBlock::ToolResult { tool_use_id, .. } => {
                    warn!("Ignoring tool_result block {} in model output", tool_use_id);
                }
            }
        }

        Ok(match tool_use {
            Some((id, name, input)) => ConversationState::DispatchingTool {
                pending,
                id,
                name,
                input,
            },
            None if pending.iter().any(ContentBlock::is_text) => {
                ConversationState::Done(QueryOutcome::Answered { tool_calls })
            }
            None => {
                warn!("Model returned neither text nor tool use, ending query");
                ConversationState::Done(QueryOutcome::EmptyResponse { tool_calls })
            }
        })
    }

    /// Run a tool and produce the text sent back to the model. Tool failures
    /// become result text so the model can respond to them.
    async fn dispatch_tool(&self, name: &str, input: &Value) -> Result<String, ChatError> {
        self.ui
            .display(UIMessage::ToolCall {
                name: name.to_string(),
                arguments: input.to_string(),
            })
            .await?;

        match self.runner.execute(name, input).await {
            Ok(result) => {
                debug!("Tool {} completed successfully", name);
                Ok(result)
            }
            Err(e) => {
                let message = format!("Tool execution failed: {e}");
                error!("{}", message);
                Ok(message)
            }
        }
    }

    async fn call_model(&mut self, messages: &[Message]) -> Result<LLMResponse, ChatError> {
        let tools = self.runner.schemas().to_vec();
        let tool_count = tools.len();
        let request = LLMRequest {
            messages: messages.to_vec(),
            tools: Some(tools),
            max_tokens: self.max_tokens,
        };

        let start = Instant::now();
        let result = self.llm.send_message(request).await;
        let elapsed = start.elapsed();

        match result {
            Ok(response) => {
                debug!(
                    "Model call took {:?} (input tokens: {}, output tokens: {})",
                    elapsed, response.usage.input_tokens, response.usage.output_tokens
                );
                self.audit.log_api_call(
                    &self.model,
                    self.max_tokens,
                    tool_count,
                    messages.len(),
                    elapsed,
                    Ok(()),
                );
                Ok(response)
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!("Anthropic API error: {}", message);
                self.audit.log_api_call(
                    &self.model,
                    self.max_tokens,
                    tool_count,
                    messages.len(),
                    elapsed,
                    Err(&message),
                );
                self.audit
                    .log_error("chatbot", "api_call", &message, "api_error");
                Err(ChatError::ModelApi(message))
            }
        }
    }
}
