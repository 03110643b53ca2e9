use super::{date_from_file_name, AuditEvent, AuditEventType};
use anyhow::{anyhow, Context, Result};
use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Reports produced by the `audit` subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportKind {
    Performance,
    Compliance,
    Session,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportPeriod {
    pub start_date: String,
    pub end_date: String,
    pub days: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionError {
    pub operation: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_seconds: Option<f64>,
    pub total_events: usize,
    pub event_types: BTreeMap<String, usize>,
    pub components: BTreeMap<String, usize>,
    pub error_count: usize,
    pub errors: Vec<SessionError>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageCounts {
    pub total_events: usize,
    pub user_queries: usize,
    pub api_calls: usize,
    pub tool_executions: usize,
    pub errors: usize,
}

/// Duration statistics over the successful events of one kind
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DurationStats {
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PerformanceBreakdown {
    pub api: DurationStats,
    pub tools: DurationStats,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBreakdown {
    pub total: usize,
    pub by_component: BTreeMap<String, usize>,
    pub by_operation: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PerformanceMetrics {
    pub period: ReportPeriod,
    pub usage: UsageCounts,
    pub performance: PerformanceBreakdown,
    pub errors: ErrorBreakdown,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComplianceSummary {
    pub total_sessions: usize,
    pub total_events: usize,
    pub sessions_with_errors: usize,
    pub error_rate: f64,
    pub avg_session_duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventBreakdown {
    pub by_type: BTreeMap<String, usize>,
    pub by_component: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComplianceReport {
    pub report_period: ReportPeriod,
    pub summary: ComplianceSummary,
    pub event_breakdown: EventBreakdown,
    pub security_events: Vec<AuditEvent>,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Report {
    Performance(PerformanceMetrics),
    Compliance(ComplianceReport),
    Session(SessionSummary),
}

/// Reads audit files back and aggregates them into reports
pub struct AuditAnalyzer {
    log_dir: PathBuf,
}

impl AuditAnalyzer {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Load events from files whose date lies in `[start, end]`, both bounds optional
    pub fn load_events(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<AuditEvent>> {
        if !self.log_dir.exists() {
            warn!("Audit log directory does not exist: {}", self.log_dir.display());
            return Ok(Vec::new());
        }

        let mut files: Vec<(NaiveDate, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.log_dir)
            .with_context(|| format!("Failed to list {}", self.log_dir.display()))?
        {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with("audit_") || !name.ends_with(".log") {
                continue;
            }
            let Some(date) = date_from_file_name(name) else {
                warn!("Could not parse date from filename: {}", name);
                continue;
            };
            if start.is_some_and(|start| date < start) || end.is_some_and(|end| date > end) {
                continue;
            }
            files.push((date, path));
        }
        files.sort();

        let mut events = Vec::new();
        for (_, path) in files {
            match fs::read_to_string(&path) {
                Ok(content) => events.extend(parse_lines(&path, &content)),
                Err(e) => warn!("Error reading {}: {}", path.display(), e),
            }
        }
        Ok(events)
    }

    /// Summary of one session across all audit files, `None` if the id never occurs
    pub fn session_summary(&self, session_id: &str) -> Result<Option<SessionSummary>> {
        let events = self.load_events(None, None)?;
        Ok(summarize_session(session_id, &events))
    }

    pub fn performance_metrics(&self, days: u32) -> Result<PerformanceMetrics> {
        let (period, start, end) = period_for(days);
        let events = self.load_events(Some(start), Some(end))?;

        let api_calls = of_type(&events, AuditEventType::ApiCall);
        let tool_executions = of_type(&events, AuditEventType::ToolExecution);
        let user_queries = of_type(&events, AuditEventType::UserQuery);
        let errors = of_type(&events, AuditEventType::Error);

        Ok(PerformanceMetrics {
            period,
            usage: UsageCounts {
                total_events: events.len(),
                user_queries: user_queries.len(),
                api_calls: api_calls.len(),
                tool_executions: tool_executions.len(),
                errors: errors.len(),
            },
            performance: PerformanceBreakdown {
                api: duration_stats(&api_calls),
                tools: duration_stats(&tool_executions),
            },
            errors: ErrorBreakdown {
                total: errors.len(),
                by_component: count_by(errors.iter().copied(), |e| e.component.clone()),
                by_operation: count_by(errors.iter().copied(), |e| e.operation.clone()),
            },
        })
    }

    pub fn compliance_report(&self, days: u32) -> Result<ComplianceReport> {
        let (period, start, end) = period_for(days);
        let events = self.load_events(Some(start), Some(end))?;

        let mut session_ids: Vec<&str> = events
            .iter()
            .map(|e| e.session_id.as_str())
            .filter(|id| !id.is_empty())
            .collect();
        session_ids.sort();
        session_ids.dedup();

        let sessions: Vec<SessionSummary> = session_ids
            .iter()
            .filter_map(|id| summarize_session(id, &events))
            .collect();

        let total_sessions = sessions.len();
        let sessions_with_errors = sessions.iter().filter(|s| s.error_count > 0).count();
        let (error_rate, avg_session_duration_seconds) = if total_sessions > 0 {
            let total_duration: f64 = sessions.iter().filter_map(|s| s.duration_seconds).sum();
            (
                sessions_with_errors as f64 / total_sessions as f64,
                total_duration / total_sessions as f64,
            )
        } else {
            (0.0, 0.0)
        };

        Ok(ComplianceReport {
            report_period: period,
            summary: ComplianceSummary {
                total_sessions,
                total_events: events.len(),
                sessions_with_errors,
                error_rate,
                avg_session_duration_seconds,
            },
            event_breakdown: EventBreakdown {
                by_type: count_by(events.iter(), |e| e.event_type.as_str().to_string()),
                by_component: count_by(events.iter(), |e| e.component.clone()),
            },
            security_events: events
                .iter()
                .filter(|e| e.event_type == AuditEventType::SecurityEvent)
                .cloned()
                .collect(),
            sessions,
        })
    }

    /// Build the requested report. Session reports need an id that occurs in the logs.
    pub fn generate(&self, kind: ReportKind, days: u32, session_id: Option<&str>) -> Result<Report> {
        match kind {
            ReportKind::Performance => Ok(Report::Performance(self.performance_metrics(days)?)),
            ReportKind::Compliance => Ok(Report::Compliance(self.compliance_report(days)?)),
            ReportKind::Session => {
                let session_id = session_id
                    .ok_or_else(|| anyhow!("session-id is required for session reports"))?;
                self.session_summary(session_id)?
                    .map(Report::Session)
                    .ok_or_else(|| anyhow!("Session {session_id} not found"))
            }
        }
    }
}

/// Write a report as pretty JSON, creating parent directories
pub fn export_report(report: &Report, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    fs::write(output, json).with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Report exported to: {}", output.display());
    Ok(())
}

fn parse_lines(path: &Path, content: &str) -> Vec<AuditEvent> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str(line.trim()) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Invalid JSON in {}:{}: {}", path.display(), index + 1, e);
                None
            }
        })
        .collect()
}

fn of_type(events: &[AuditEvent], event_type: AuditEventType) -> Vec<&AuditEvent> {
    events.iter().filter(|e| e.event_type == event_type).collect()
}

fn period_for(days: u32) -> (ReportPeriod, NaiveDate, NaiveDate) {
    let end = Local::now().naive_local();
    let start = end
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDateTime::MIN);
    let period = ReportPeriod {
        start_date: start.format("%Y-%m-%dT%H:%M:%S").to_string(),
        end_date: end.format("%Y-%m-%dT%H:%M:%S").to_string(),
        days,
    };
    (period, start.date(), end.date())
}

fn parse_timestamp(timestamp: &str) -> Option<NaiveDateTime> {
    timestamp.parse::<NaiveDateTime>().ok().or_else(|| {
        chrono::DateTime::parse_from_rfc3339(timestamp)
            .ok()
            .map(|t| t.naive_local())
    })
}

fn summarize_session(session_id: &str, events: &[AuditEvent]) -> Option<SessionSummary> {
    let mut session_events: Vec<&AuditEvent> =
        events.iter().filter(|e| e.session_id == session_id).collect();
    if session_events.is_empty() {
        return None;
    }
    session_events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let start_event = session_events
        .iter()
        .find(|e| e.event_type == AuditEventType::SessionStart);
    let end_event = session_events
        .iter()
        .find(|e| e.event_type == AuditEventType::SessionEnd);

    let duration_seconds = match (start_event, end_event) {
        (Some(start), Some(end)) => parse_timestamp(&start.timestamp)
            .zip(parse_timestamp(&end.timestamp))
            .map(|(start, end)| (end - start).num_milliseconds() as f64 / 1000.0),
        _ => None,
    };

    let errors: Vec<SessionError> = session_events
        .iter()
        .filter(|e| e.event_type == AuditEventType::Error)
        .map(|e| SessionError {
            operation: e.operation.clone(),
            error_message: e.error_message.clone(),
        })
        .collect();

    Some(SessionSummary {
        session_id: session_id.to_string(),
        start_time: start_event.map(|e| e.timestamp.clone()),
        end_time: end_event.map(|e| e.timestamp.clone()),
        duration_seconds,
        total_events: session_events.len(),
        event_types: count_by(session_events.iter().copied(), |e| {
            e.event_type.as_str().to_string()
        }),
        components: count_by(session_events.iter().copied(), |e| e.component.clone()),
        error_count: errors.len(),
        errors,
    })
}

fn duration_stats(events: &[&AuditEvent]) -> DurationStats {
    let durations: Vec<f64> = events
        .iter()
        .filter(|e| e.success)
        .map(|e| e.duration_ms.unwrap_or(0.0))
        .collect();
    let successes = events.iter().filter(|e| e.success).count();

    if durations.is_empty() {
        return DurationStats {
            avg_duration_ms: 0.0,
            min_duration_ms: 0.0,
            max_duration_ms: 0.0,
            success_rate: 0.0,
        };
    }

    DurationStats {
        avg_duration_ms: durations.iter().sum::<f64>() / durations.len() as f64,
        min_duration_ms: durations.iter().copied().fold(f64::INFINITY, f64::min),
        max_duration_ms: durations.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        success_rate: successes as f64 / events.len() as f64,
    }
}

fn count_by<'a, I, F>(events: I, key: F) -> BTreeMap<String, usize>
where
    I: Iterator<Item = &'a AuditEvent>,
    F: Fn(&AuditEvent) -> String,
{
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(key(event)).or_insert(0) += 1;
    }
    counts
}
