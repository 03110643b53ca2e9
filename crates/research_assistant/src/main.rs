mod app;
mod audit;
mod chat;
mod cli;
mod config;
mod logging;
mod tools;
mod ui;


use crate::audit::analyzer::{export_report, AuditAnalyzer};
use crate::audit::AuditLog;
use crate::chat::ConversationEngine;
use crate::cli::{Args, AuditArgs, Command};
use crate::config::{Config, LogLevel};
use crate::logging::{setup_logging, LogDestination};
use crate::tools::ToolRunner;
use crate::ui::terminal::TerminalUI;
use crate::ui::UserInterface;
use anyhow::{Context, Result};
use llm::{AnthropicClient, LLMProvider};
use papers::{ArxivClient, PaperStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn run_audit(args: AuditArgs, verbose: u8) -> Result<()> {
    setup_logging(LogLevel::Warning, verbose, LogDestination::Stderr)?;

    let analyzer = AuditAnalyzer::new(&args.log_dir);
    let report = analyzer.generate(args.report, args.days, args.session_id.as_deref())?;

    match args.output {
        Some(output) => {
            export_report(&report, &output)?;
            println!("Report exported to: {}", output.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn create_llm_client(config: &Config) -> Result<Box<dyn LLMProvider>> {
    let client = match config.request_timeout {
        Some(timeout) => AnthropicClient::with_timeout(
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
            timeout,
        )
        .context("Failed to initialize Anthropic client")?,
        None => AnthropicClient::new(
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
        ),
    };
    Ok(Box::new(client))
}

async fn run_assistant(args: Args) -> Result<()> {
    let config = Config::from_env()?.with_overrides(args.model, args.base_url);
    config.ensure_paper_dir()?;

    setup_logging(
        config.log_level,
        args.verbose,
        LogDestination::File(config.log_file.clone()),
    )?;
    info!("Starting research assistant with model {}", config.model);

    let audit = AuditLog::open(config.audit.clone())?;
    match audit.session_id() {
        Some(session_id) if audit.is_enabled() => {
            info!("Audit session {} started", session_id);
            if let Some(path) = audit.current_file() {
                debug!("Audit events go to {}", path.display());
            }
            debug!("Audit configuration: {}", config.audit_summary());
        }
        _ => info!("Audit logging disabled"),
    }
    match audit.prune_expired() {
        Ok(0) => {}
        Ok(removed) => info!("Removed {} expired audit log files", removed),
        Err(e) => warn!("Failed to prune audit logs: {:#}", e),
    }

    let registry = tools::default_registry()?;
    let runner = ToolRunner::new(
        registry,
        Box::new(ArxivClient::new(config.arxiv_url.clone())),
        PaperStore::new(&config.paper_dir),
        audit.clone(),
    );

    let terminal_ui = Arc::new(TerminalUI::new()?);
    let user_interface: Arc<dyn UserInterface> = terminal_ui.clone();
    let mut engine = ConversationEngine::new(
        create_llm_client(&config)?,
        runner,
        user_interface,
        audit.clone(),
        config.model.clone(),
        config.max_tokens,
    );

    let result = match args.query {
        Some(query) => app::run_single_query(&mut engine, terminal_ui.as_ref(), &query).await,
        None => app::run_chat_loop(&mut engine, terminal_ui.as_ref()).await,
    };

    audit.end_session();
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let mut args = Args::parse();

    if let Some(Command::Audit(audit_args)) = args.command.take() {
        if let Err(e) = run_audit(audit_args, args.verbose) {
            eprintln!("❌ Error: {e:#}");
            std::process::exit(1);
        }
        return Ok(());
    }

    if let Err(e) = run_assistant(args).await {
        eprintln!("❌ Failed to start research assistant: {e:#}");
        eprintln!();
        eprintln!("Please check:");
        eprintln!("  1. ANTHROPIC_API_KEY is set in your environment or .env file");
        eprintln!("  2. You have an internet connection");
        eprintln!("  3. All configuration values are valid");
        std::process::exit(1);
    }
    Ok(())
}
