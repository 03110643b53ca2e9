use crate::audit::analyzer::ReportKind;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze audit logs and print or export a report
    Audit(AuditArgs),
}

#[derive(ClapArgs, Debug)]
pub struct AuditArgs {
    /// Kind of report to generate
    #[arg(long, value_enum)]
    pub report: ReportKind,

    /// Directory containing the audit log files
    #[arg(long, default_value = "logs/audit")]
    pub log_dir: PathBuf,

    /// Number of days to include in the report
    #[arg(long, default_value_t = 7)]
    pub days: u32,

    /// Session to summarize (required for session reports)
    #[arg(long)]
    pub session_id: Option<String>,

    /// Write the report to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Define the application arguments
#[derive(Parser, Debug)]
#[command(version, about = "Interactive research assistant for arXiv papers", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Answer a single question and exit instead of starting the chat loop
    #[arg(short, long)]
    pub query: Option<String>,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Model name to use, overrides ANTHROPIC_MODEL
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// API base URL for the model provider, overrides ANTHROPIC_BASE_URL
    #[arg(long)]
    pub base_url: Option<String>,
}

impl Args {
    pub fn parse() -> Self {
        <Args as Parser>::parse()
    }
}
