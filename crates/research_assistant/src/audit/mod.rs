//! Structured audit trail of user queries, model calls and tool executions
//!
//! Events are appended as one JSON object per line to `audit_YYYYMMDD.log`
//! inside the audit directory. Recording is best-effort: write failures are
//! logged and never interrupt the conversation.

pub mod analyzer;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const FILE_PREFIX: &str = "audit_";
const FILE_SUFFIX: &str = ".log";
const MASKED_KEY: &str = "sk-***MASKED***";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    UserQuery,
    ApiCall,
    ToolExecution,
    ToolResult,
    Error,
    SessionStart,
    SessionEnd,
    ConfigurationChange,
    SecurityEvent,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::UserQuery => "user_query",
            AuditEventType::ApiCall => "api_call",
            AuditEventType::ToolExecution => "tool_execution",
            AuditEventType::ToolResult => "tool_result",
            AuditEventType::Error => "error",
            AuditEventType::SessionStart => "session_start",
            AuditEventType::SessionEnd => "session_end",
            AuditEventType::ConfigurationChange => "configuration_change",
            AuditEventType::SecurityEvent => "security_event",
        }
    }
}

/// One line of the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub event_type: AuditEventType,
    /// Local time, ISO-8601 without offset
    pub timestamp: String,
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub component: String,
    pub operation: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl AuditEvent {
    fn new(
        session_id: &str,
        event_type: AuditEventType,
        component: &str,
        operation: &str,
        details: Map<String, Value>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: now_timestamp(),
            session_id: session_id.to_string(),
            user_id: None,
            component: component.to_string(),
            operation: operation.to_string(),
            details,
            duration_ms: None,
            success: true,
            error_message: None,
        }
    }

    fn with_outcome(mut self, duration: Option<Duration>, outcome: Result<(), &str>) -> Self {
        self.duration_ms = duration.map(|d| d.as_secs_f64() * 1000.0);
        if let Err(message) = outcome {
            self.success = false;
            self.error_message = Some(message.to_string());
        }
        self
    }
}

/// Audit switches and privacy settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditSettings {
    pub enabled: bool,
    #[serde(rename = "log_directory")]
    pub log_dir: PathBuf,
    pub retention_days: u32,
    pub log_user_queries: bool,
    pub log_api_calls: bool,
    pub log_tool_executions: bool,
    pub log_errors: bool,
    pub hash_sensitive_data: bool,
    pub mask_api_keys: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_dir: PathBuf::from("logs/audit"),
            retention_days: 90,
            log_user_queries: true,
            log_api_calls: true,
            log_tool_executions: true,
            log_errors: true,
            hash_sensitive_data: true,
            mask_api_keys: true,
        }
    }
}

impl AuditSettings {
    pub fn summary(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

struct AuditSink {
    session_id: String,
    settings: AuditSettings,
    key_pattern: Regex,
    file: Mutex<Option<(NaiveDate, File)>>,
}

/// Cloneable handle to the audit trail. The disabled handle records nothing.
#[derive(Clone, Default)]
pub struct AuditLog {
    sink: Option<Arc<AuditSink>>,
}

impl AuditLog {
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Open the audit trail for a new session and record `session_start`
    pub fn open(settings: AuditSettings) -> Result<Self> {
        if !settings.enabled {
            info!("Audit logging disabled");
            return Ok(Self::disabled());
        }

        fs::create_dir_all(&settings.log_dir).with_context(|| {
            format!(
                "Failed to create audit directory {}",
                settings.log_dir.display()
            )
        })?;

        let session_id = Uuid::new_v4().to_string();
        let summary = settings.summary();
        let sink = AuditSink {
            session_id: session_id.clone(),
            settings,
            key_pattern: Regex::new(r"sk-[A-Za-z0-9_\-]{16,}")?,
            file: Mutex::new(None),
        };
        let log = Self {
            sink: Some(Arc::new(sink)),
        };

        info!("Audit session {} started", session_id);
        log.record(AuditEvent::new(
            &session_id,
            AuditEventType::SessionStart,
            "system",
            "session_start",
            object(json!({ "session_id": session_id, "audit_config": summary })),
        ));
        Ok(log)
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.sink.as_deref().map(|sink| sink.session_id.as_str())
    }

    /// Path of today's audit file
    pub fn current_file(&self) -> Option<PathBuf> {
        self.sink
            .as_ref()
            .map(|sink| sink.settings.log_dir.join(file_name_for(Local::now().date_naive())))
    }

    pub fn log_user_query(&self, query: &str) {
        let Some(sink) = self.enabled_sink(|s| s.log_user_queries) else {
            return;
        };

        let mut details = object(json!({
            "query_length": query.chars().count(),
            "query_hash": sha256_hex(query),
        }));
        if !sink.settings.hash_sensitive_data {
            details.insert("query".to_string(), Value::String(query.to_string()));
        }

        self.record(AuditEvent::new(
            &sink.session_id,
            AuditEventType::UserQuery,
            "chatbot",
            "user_query",
            details,
        ));
    }

    pub fn log_api_call(
        &self,
        model: &str,
        max_tokens: u32,
        tool_count: usize,
        message_count: usize,
        duration: Duration,
        outcome: Result<(), &str>,
    ) {
        let Some(sink) = self.enabled_sink(|s| s.log_api_calls) else {
            return;
        };

        let details = object(json!({
            "model": model,
            "max_tokens": max_tokens,
            "tool_count": tool_count,
            "message_count": message_count,
            "api_provider": "anthropic",
        }));
        self.record(
            AuditEvent::new(
                &sink.session_id,
                AuditEventType::ApiCall,
                "api",
                "anthropic_call",
                details,
            )
            .with_outcome(Some(duration), outcome),
        );
    }

    pub fn log_tool_execution(
        &self,
        tool_name: &str,
        tool_args: &Value,
        duration: Duration,
        outcome: Result<(), &str>,
    ) {
        let Some(sink) = self.enabled_sink(|s| s.log_tool_executions) else {
            return;
        };

        let arg_count = tool_args.as_object().map(|args| args.len()).unwrap_or(0);
        let details = object(json!({
            "tool_name": tool_name,
            "tool_args": tool_args,
            "arg_count": arg_count,
        }));
        self.record(
            AuditEvent::new(
                &sink.session_id,
                AuditEventType::ToolExecution,
                "tools",
                &format!("execute_{tool_name}"),
                details,
            )
            .with_outcome(Some(duration), outcome),
        );
    }

    pub fn log_tool_result(&self, tool_name: &str, result_size: usize, result_type: &str) {
        let Some(sink) = self.enabled_sink(|s| s.log_tool_executions) else {
            return;
        };

        let details = object(json!({
            "tool_name": tool_name,
            "result_size": result_size,
            "result_type": result_type,
        }));
        self.record(AuditEvent::new(
            &sink.session_id,
            AuditEventType::ToolResult,
            "tools",
            &format!("result_{tool_name}"),
            details,
        ));
    }

    pub fn log_error(&self, component: &str, operation: &str, message: &str, error_type: &str) {
        let Some(sink) = self.enabled_sink(|s| s.log_errors) else {
            return;
        };

        let details = object(json!({
            "error_type": error_type,
            "error_message": message,
        }));
        self.record(
            AuditEvent::new(
                &sink.session_id,
                AuditEventType::Error,
                component,
                operation,
                details,
            )
            .with_outcome(None, Err(message)),
        );
    }

    pub fn log_security_event(&self, description: &str, severity: &str, extra: Map<String, Value>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let mut details = object(json!({
            "description": description,
            "severity": severity,
        }));
        details.extend(extra);
        self.record(AuditEvent::new(
            &sink.session_id,
            AuditEventType::SecurityEvent,
            "security",
            "security_event",
            details,
        ));
    }

    /// Record `session_end`
    pub fn end_session(&self) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        info!("Audit session {} ended", sink.session_id);
        self.record(AuditEvent::new(
            &sink.session_id,
            AuditEventType::SessionEnd,
            "system",
            "session_end",
            object(json!({ "session_id": sink.session_id })),
        ));
    }

    /// Delete audit files older than the configured retention window
    pub fn prune_expired(&self) -> Result<usize> {
        match self.sink.as_ref() {
            Some(sink) => prune_expired(
                &sink.settings.log_dir,
                sink.settings.retention_days,
                Local::now().date_naive(),
            ),
            None => Ok(0),
        }
    }

    fn enabled_sink(&self, category: impl Fn(&AuditSettings) -> bool) -> Option<&AuditSink> {
        self.sink
            .as_deref()
            .filter(|sink| category(&sink.settings))
    }

    fn record(&self, mut event: AuditEvent) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let mut masked = false;
        if sink.settings.mask_api_keys {
            masked |= mask_keys(&sink.key_pattern, &mut event.details);
            if let Some(message) = event.error_message.as_mut() {
                masked |= mask_string(&sink.key_pattern, message);
            }
        }

        if let Err(e) = sink.write(&event) {
            warn!("Failed to write audit event: {e:#}");
            return;
        }

        if masked && event.event_type != AuditEventType::SecurityEvent {
            self.log_security_event(
                "API key pattern masked in audit record",
                "warning",
                object(json!({ "masked_event_id": event.event_id })),
            );
        }
    }
}

impl AuditSink {
    fn write(&self, event: &AuditEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        let today = Local::now().date_naive();

        let mut guard = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("Audit file lock poisoned"))?;

        let needs_rotation = !matches!(guard.as_ref(), Some((date, _)) if *date == today);
        if needs_rotation {
            let path = self.settings.log_dir.join(file_name_for(today));
            debug!("Opening audit file {}", path.display());
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            *guard = Some((today, file));
        }

        if let Some((_, file)) = guard.as_mut() {
            writeln!(file, "{line}")?;
            file.flush()?;
        }
        Ok(())
    }
}

pub fn file_name_for(date: NaiveDate) -> String {
    format!("{FILE_PREFIX}{}{FILE_SUFFIX}", date.format("%Y%m%d"))
}

/// Date encoded in an `audit_YYYYMMDD.log` file name
pub fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let stamp = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    NaiveDate::parse_from_str(stamp, "%Y%m%d").ok()
}

/// Remove audit files dated more than `retention_days` before `today`
pub fn prune_expired(dir: &Path, retention_days: u32, today: NaiveDate) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let cutoff = today
        .checked_sub_days(Days::new(u64::from(retention_days)))
        .unwrap_or(NaiveDate::MIN);

    let mut removed = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        let Some(date) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(date_from_file_name)
        else {
            continue;
        };

        if date < cutoff {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed expired audit file {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }

    if removed > 0 {
        info!("Pruned {} expired audit files", removed);
    }
    Ok(removed)
}

fn now_timestamp() -> String {
    Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn mask_keys(pattern: &Regex, details: &mut Map<String, Value>) -> bool {
    let mut masked = false;
    for value in details.values_mut() {
        masked |= mask_value(pattern, value);
    }
    masked
}

fn mask_value(pattern: &Regex, value: &mut Value) -> bool {
    match value {
        Value::String(text) => mask_string(pattern, text),
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |masked, item| mask_value(pattern, item) | masked),
        Value::Object(map) => mask_keys(pattern, map),
        _ => false,
    }
}

fn mask_string(pattern: &Regex, text: &mut String) -> bool {
    if !pattern.is_match(text) {
        return false;
    }
    *text = pattern.replace_all(text, MASKED_KEY).into_owned();
    true
}
