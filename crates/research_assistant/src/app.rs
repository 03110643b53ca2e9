use crate::chat::{ConversationEngine, QueryOutcome};
use crate::ui::{UIError, UIMessage, UserInterface};
use anyhow::Result;
use tracing::{info, warn};

const PROMPT: &str = "\n💬 Your question: ";

const BANNER: &[&str] = &[
    "🤖 ArXiv Research Assistant",
    "Ask me to find papers on a topic or to tell you about a paper I found.",
    "Examples:",
    "  • Search for 3 papers on 'quantum computing'",
    "  • Tell me about paper 2412.07992v3",
    "Type 'quit', 'exit' or 'q' to leave.",
];

fn is_exit_command(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q")
}

async fn notice(ui: &dyn UserInterface, text: &str) -> Result<(), UIError> {
    ui.display(UIMessage::Notice(text.to_string())).await
}

/// Interactive loop: one query at a time until the user leaves or input ends
pub async fn run_chat_loop(engine: &mut ConversationEngine, ui: &dyn UserInterface) -> Result<()> {
    for line in BANNER {
        notice(ui, line).await?;
    }

    let mut answered = 0usize;
    loop {
        let input = match ui.get_input(PROMPT).await {
            Ok(input) => input,
            Err(UIError::Interrupted | UIError::EndOfInput) => {
                notice(ui, "👋 Chat interrupted. Goodbye!").await?;
                break;
            }
            Err(e) => return Err(e.into()),
        };
        let input = input.trim();

        if is_exit_command(input) {
            notice(ui, "👋 Goodbye! Happy researching!").await?;
            break;
        }
        if input.is_empty() {
            notice(ui, "Please enter a question or 'quit' to exit.").await?;
            continue;
        }

        notice(ui, "🤔 Processing...").await?;
        if run_query(engine, ui, input).await? {
            answered += 1;
        }
    }

    info!("Chat session ended after {} answered queries", answered);
    Ok(())
}

/// Answer one query and return. Used for `--query`.
pub async fn run_single_query(
    engine: &mut ConversationEngine,
    ui: &dyn UserInterface,
    query: &str,
) -> Result<()> {
    run_query(engine, ui, query).await?;
    Ok(())
}

/// Process a query, racing it against Ctrl-C. Returns whether the model answered.
async fn run_query(
    engine: &mut ConversationEngine,
    ui: &dyn UserInterface,
    query: &str,
) -> Result<bool> {
    let result = tokio::select! {
        result = engine.process_query(query) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Query interrupted by user");
            notice(ui, "⏹ Query cancelled.").await?;
            return Ok(false);
        }
    };

    match result {
        Ok(QueryOutcome::Answered { tool_calls }) => {
            info!("Query answered after {} tool calls", tool_calls);
            Ok(true)
        }
        Ok(QueryOutcome::EmptyResponse { .. }) => {
            notice(ui, "The model returned an empty response.").await?;
            Ok(false)
        }
        Ok(QueryOutcome::EmptyQuery) => Ok(false),
        Err(e) => {
            ui.display(UIMessage::Error(format!(
                "Sorry, I encountered an error: {e}"
            )))
            .await?;
            Ok(false)
        }
    }
}
