use crate::{types::*, utils, ApiError, LLMProvider};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Tool declaration in the shape the Messages API expects
#[derive(Debug, Serialize)]
struct AnthropicTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

/// Request body for the Messages API
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool<'a>>,
}

/// Response structure for Anthropic API responses
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    /// Raw blocks, block types this client does not model are dropped in `content_blocks`
    content: Vec<serde_json::Value>,
    #[serde(default)]
    #[allow(dead_code)]
    id: String,
    #[serde(default)]
    #[allow(dead_code)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

/// Usage information from Anthropic API
#[derive(Debug, Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    pub fn default_base_url() -> String {
        "https://api.anthropic.com/v1".to_string()
    }

    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Create a client whose requests fail after `timeout` instead of waiting indefinitely
    pub fn with_timeout(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url,
            model,
        })
    }

    fn get_url(&self) -> String {
        format!("{}/messages", self.base_url.trim_end_matches('/'))
    }

    fn build_request_body(&self, request: &LLMRequest) -> Result<serde_json::Value> {
        let tools = request
            .tools
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|tool| AnthropicTool {
                name: &tool.name,
                description: &tool.description,
                input_schema: &tool.parameters,
            })
            .collect();

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages: &request.messages,
            tools,
        };
        Ok(serde_json::to_value(body)?)
    }
}

#[async_trait]
impl LLMProvider for AnthropicClient {
    async fn send_message(&mut self, request: LLMRequest) -> Result<LLMResponse> {
        let body = self.build_request_body(&request)?;
        debug!(
            "Sending {} messages to {} (max_tokens: {})",
            request.messages.len(),
            self.model,
            request.max_tokens
        );

        let response = self
            .client
            .post(self.get_url())
            .header("accept", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        let response = utils::check_response_error(response).await?;

        let response_text = response
            .text()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        let anthropic_response: AnthropicResponse = serde_json::from_str(&response_text)
            .map_err(|e| ApiError::Unknown(format!("Failed to parse response: {e}")))?;

        debug!(
            "Received {} content blocks (stop_reason: {:?})",
            anthropic_response.content.len(),
            anthropic_response.stop_reason
        );

        Ok(LLMResponse {
            content: content_blocks(anthropic_response.content),
            usage: Usage {
                input_tokens: anthropic_response.usage.input_tokens,
                output_tokens: anthropic_response.usage.output_tokens,
            },
        })
    }
}

/// Decode response blocks, skipping types such as `thinking` or `server_tool_use`
fn content_blocks(raw: Vec<serde_json::Value>) -> Vec<ContentBlock> {
    raw.into_iter()
        .filter_map(|block| {
            let block_type = block
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("<missing>")
                .to_string();
            match serde_json::from_value::<ContentBlock>(block) {
                Ok(block) => Some(block),
                Err(e) => {
                    warn!("Skipping unsupported content block '{}': {}", block_type, e);
                    None
                }
            }
        })
        .collect()
}
