use crate::types::{ContentBlock, Message, MessageContent};
use std::fmt;

impl fmt::Display for ContentBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentBlock::Text { text } => {
                writeln!(f, "Text: {}", text.replace('\n', "\n    "))
            }
            ContentBlock::ToolUse { id, name, input } => {
                writeln!(f, "ToolUse: id={id}, name={name}")?;
                writeln!(
                    f,
                    "  Input: {}",
                    serde_json::to_string_pretty(input)
                        .unwrap_or_else(|_| input.to_string())
                        .replace('\n', "\n  ")
                )
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                let error_suffix = if is_error.unwrap_or(false) {
                    " (ERROR)"
                } else {
                    ""
                };
                writeln!(f, "ToolResult: tool_use_id={tool_use_id}{error_suffix}")?;
                writeln!(f, "  Content: {}", content.replace('\n', "\n  "))
            }
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Role: {:?}", self.role)?;
        match &self.content {
            MessageContent::Text(text) => {
                writeln!(f, "Content: {}", text.replace('\n', "\n  "))
            }
            MessageContent::Structured(blocks) => {
                for block in blocks {
                    write!(f, "{block}")?;
                }
                Ok(())
            }
        }
    }
}
