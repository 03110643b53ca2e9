//! LLM integration providing an abstraction over the model backend
//!
//! This crate implements:
//! - Common interface for LLM interactions via the LLMProvider trait
//! - The Anthropic Messages API client
//! - Shared message and content block types

#[cfg(test)]
mod tests;

mod utils;

pub mod anthropic;
pub mod display;
pub mod types;

pub use anthropic::AnthropicClient;
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

/// Trait for different LLM provider implementations
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Sends a request to the LLM service and waits for the complete response
    async fn send_message(&mut self, request: LLMRequest) -> Result<LLMResponse>;
}
