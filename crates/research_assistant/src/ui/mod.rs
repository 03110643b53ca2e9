pub mod terminal;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum UIMessage {
    /// Text produced by the model
    AssistantText(String),
    /// A tool invocation about to run
    ToolCall { name: String, arguments: String },
    /// Status lines from the application itself
    Notice(String),
    /// One-line error report
    Error(String),
}

#[derive(Error, Debug)]
pub enum UIError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Input interrupted")]
    Interrupted,
    #[error("End of input")]
    EndOfInput,
    #[error("Line editor error: {0}")]
    LineEditor(String),
}

#[async_trait]
pub trait UserInterface: Send + Sync {
    /// Display a message to the user
    async fn display(&self, message: UIMessage) -> Result<(), UIError>;

    /// Get input from the user
    async fn get_input(&self, prompt: &str) -> Result<String, UIError>;
}
