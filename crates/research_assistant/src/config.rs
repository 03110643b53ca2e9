use crate::audit::AuditSettings;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("{var} must be a positive integer (got '{value}')")]
    NotPositive { var: &'static str, value: String },

    #[error("LOG_LEVEL must be one of: DEBUG, INFO, WARNING, ERROR, CRITICAL (got '{0}')")]
    InvalidLogLevel(String),

    #[error("Failed to create directory {}: {message}", .path.display())]
    Directory { path: PathBuf, message: String },
}

/// Levels accepted by `LOG_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive used for the workspace crates
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
    }
}

/// Process-wide settings, read once at startup and passed down explicitly
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Upper bound for one model call, `None` waits indefinitely
    pub request_timeout: Option<Duration>,
    pub arxiv_url: String,
    pub paper_dir: PathBuf,
    pub max_tokens: u32,
    pub log_level: LogLevel,
    pub log_file: PathBuf,
    pub audit: AuditSettings,
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let get_or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());
        let flag = |name: &str| {
            get(name)
                .map(|value| value.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(true)
        };

        let api_key = get("ANTHROPIC_API_KEY").ok_or(ConfigError::MissingVar("ANTHROPIC_API_KEY"))?;

        let max_tokens = match get("MAX_TOKENS") {
            Some(value) => parse_positive("MAX_TOKENS", &value)?,
            None => DEFAULT_MAX_TOKENS,
        };
        let request_timeout = get("ANTHROPIC_TIMEOUT_SECS")
            .map(|value| parse_positive("ANTHROPIC_TIMEOUT_SECS", &value))
            .transpose()?
            .map(|secs| Duration::from_secs(u64::from(secs)));
        let retention_days = match get("AUDIT_LOG_RETENTION_DAYS") {
            Some(value) => parse_positive("AUDIT_LOG_RETENTION_DAYS", &value)?,
            None => 90,
        };
        let log_level = get_or("LOG_LEVEL", "INFO").trim().parse::<LogLevel>()?;

        Ok(Self {
            api_key,
            model: get_or("ANTHROPIC_MODEL", DEFAULT_MODEL),
            base_url: get_or("ANTHROPIC_BASE_URL", &llm::AnthropicClient::default_base_url()),
            request_timeout,
            arxiv_url: get_or("ARXIV_API_URL", &papers::ArxivClient::default_base_url()),
            paper_dir: PathBuf::from(get_or("PAPER_DIR", "papers")),
            max_tokens,
            log_level,
            log_file: PathBuf::from(get_or("LOG_FILE", "logs/chatbot.log")),
            audit: AuditSettings {
                enabled: flag("ENABLE_AUDIT_LOGGING"),
                log_dir: PathBuf::from(get_or("AUDIT_LOG_DIR", "logs/audit")),
                retention_days,
                log_user_queries: flag("LOG_USER_QUERIES"),
                log_api_calls: flag("LOG_API_CALLS"),
                log_tool_executions: flag("LOG_TOOL_EXECUTIONS"),
                log_errors: flag("LOG_ERRORS"),
                hash_sensitive_data: flag("HASH_SENSITIVE_DATA"),
                mask_api_keys: flag("MASK_API_KEYS"),
            },
        })
    }

    /// Apply command line overrides on top of the environment
    pub fn with_overrides(mut self, model: Option<String>, base_url: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(base_url) = base_url {
            self.base_url = base_url;
        }
        self
    }

    /// Create the paper store root if it is missing
    pub fn ensure_paper_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.paper_dir).map_err(|e| ConfigError::Directory {
            path: self.paper_dir.clone(),
            message: e.to_string(),
        })
    }

    /// Audit settings as recorded in the `session_start` event
    pub fn audit_summary(&self) -> serde_json::Value {
        self.audit.summary()
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(number) if number > 0 => Ok(number),
        _ => Err(ConfigError::NotPositive {
            var,
            value: value.to_string(),
        }),
    }
}
