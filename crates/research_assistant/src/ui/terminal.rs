use super::{UIError, UIMessage, UserInterface};
use async_trait::async_trait;
use crossterm::style::{self, Color, Stylize};
use rustyline::{error::ReadlineError, history::DefaultHistory, Config, Editor};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub struct TerminalUI {
    line_editor: Arc<Mutex<Editor<(), DefaultHistory>>>,
    // Tests capture output here instead of stdout
    writer: Option<Arc<Mutex<Box<dyn Write + Send>>>>,
}

impl TerminalUI {
    pub fn new() -> Result<Self, UIError> {
        Ok(Self {
            line_editor: Arc::new(Mutex::new(create_editor()?)),
            writer: None,
        })
    }

    #[cfg(test)]
    pub fn with_test_writer(writer: Box<dyn Write + Send>) -> Result<Self, UIError> {
        Ok(Self {
            line_editor: Arc::new(Mutex::new(create_editor()?)),
            writer: Some(Arc::new(Mutex::new(writer))),
        })
    }

    fn write_line(&self, line: &str) -> Result<(), UIError> {
        match &self.writer {
            Some(writer) => {
                let mut writer = writer
                    .lock()
                    .map_err(|_| UIError::LineEditor("Output writer lock poisoned".to_string()))?;
                writeln!(writer, "{line}")?;
                writer.flush()?;
            }
            None => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{line}")?;
                stdout.flush()?;
            }
        }
        Ok(())
    }

    fn render(message: &UIMessage) -> String {
        match message {
            UIMessage::AssistantText(text) => text.clone(),
            UIMessage::ToolCall { name, arguments } => format!(
                "🔧 Calling tool '{}' with args: {}",
                name.clone().bold().with(Color::Blue),
                arguments
            ),
            UIMessage::Notice(text) => text.clone(),
            UIMessage::Error(text) => format!("{} {}", "❌", text.clone().with(Color::Red)),
        }
    }
}

fn create_editor() -> Result<Editor<(), DefaultHistory>, UIError> {
    let config = Config::builder()
        .edit_mode(rustyline::EditMode::Emacs)
        .build();
    Editor::with_config(config).map_err(|e| UIError::LineEditor(e.to_string()))
}

#[async_trait]
impl UserInterface for TerminalUI {
    async fn display(&self, message: UIMessage) -> Result<(), UIError> {
        self.write_line(&Self::render(&message))
    }

    async fn get_input(&self, prompt: &str) -> Result<String, UIError> {
        let editor = self.line_editor.clone();
        let colored_prompt = format!("{}{}", prompt.with(Color::Green), style::ResetColor);

        // Readline blocks, keep it off the async worker threads
        let line = tokio::task::spawn_blocking(move || {
            let mut editor = editor
                .lock()
                .map_err(|_| UIError::LineEditor("Line editor lock poisoned".to_string()))?;
            match editor.readline(&colored_prompt) {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    Ok(line)
                }
                Err(ReadlineError::Interrupted) => Err(UIError::Interrupted),
                Err(ReadlineError::Eof) => Err(UIError::EndOfInput),
                Err(e) => Err(UIError::LineEditor(e.to_string())),
            }
        })
        .await
        .map_err(|e| UIError::LineEditor(format!("Input task failed: {e}")))??;

        Ok(line.trim().to_string())
    }
}
