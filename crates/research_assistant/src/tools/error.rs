use thiserror::Error;

/// Failures surfaced by the tool runner. The conversation engine turns each
/// of them into tool-result text instead of aborting the query.
#[derive(Debug, Error, PartialEq)]
pub enum ToolError {
    #[error("Tool '{name}' not found. Available tools: {available}")]
    NotFound { name: String, available: String },

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Tool '{tool}' execution failed: {message}")]
    Execution { tool: String, message: String },
}

/// Argument values a tool rejects after decoding
#[derive(Debug, Error, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Declared schemas and registered implementations disagree
#[derive(Debug, Error, PartialEq)]
#[error("Tool schema and mapping mismatch: {}", describe_mismatch(.missing_in_mapping, .missing_in_schemas))]
pub struct RegistryMismatchError {
    pub missing_in_mapping: Vec<String>,
    pub missing_in_schemas: Vec<String>,
}

fn describe_mismatch(missing_in_mapping: &[String], missing_in_schemas: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing_in_mapping.is_empty() {
        parts.push(format!("Missing in mapping: {}", missing_in_mapping.join(", ")));
    }
    if !missing_in_schemas.is_empty() {
        parts.push(format!("Missing in schemas: {}", missing_in_schemas.join(", ")));
    }
    parts.join("; ")
}
