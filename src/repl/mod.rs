//! REPL (Read-Eval-Print Loop) module for interactive chat
//!
//! Reads a line, runs it as a built-in command or sends it to the model,
//! and renders the streamed reply with a live rate. Ctrl-C while a reply
//! is streaming cancels that reply only.

pub mod commands;
pub mod display;
pub mod render;

use anyhow::{Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

use crate::repl::commands::CommandHandler;
pub use crate::repl::display::DisplayManager;
pub use crate::repl::render::TerminalRenderer;
use crate::session::ChatSession;
use crate::telemetry::GenerationStats;

const PROMPT: &str = "You: ";

/// Interactive loop over one chat session
///
/// Lines are edited with rustyline; non-empty lines go into the history,
/// which is loaded from and saved to `history_path` when one is set.
pub struct ReplSession {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
    command_handler: CommandHandler,
    display_manager: DisplayManager,
    chat: ChatSession,
    show_speed_bar: bool,
}

impl ReplSession {
    /// Create new REPL session
    pub fn new(chat: ChatSession) -> Result<Self> {
        Self::build(chat, None)
    }

    /// Create REPL session with persistent history
    pub fn with_history(chat: ChatSession, history_path: PathBuf) -> Result<Self> {
        Self::build(chat, Some(history_path))
    }

    fn build(chat: ChatSession, history_path: Option<PathBuf>) -> Result<Self> {
        let mut editor = DefaultEditor::new().context("failed to open line editor")?;
        if let Some(path) = history_path.as_deref().filter(|p| p.exists()) {
            // a corrupt history file only costs the old entries
            if let Err(e) = editor.load_history(path) {
                tracing::warn!(error = %e, path = %path.display(), "could not load history");
            }
        }

        Ok(ReplSession {
            editor,
            history_path,
            command_handler: CommandHandler::new(),
            display_manager: DisplayManager::new(),
            chat,
            show_speed_bar: true,
        })
    }

    pub fn set_speed_bar(&mut self, enable: bool) {
        self.show_speed_bar = enable;
    }

    /// Show welcome banner
    pub fn show_welcome(&self, version: &str) {
        let client = self.chat.client();
        self.display_manager
            .show_banner(version, client.model(), client.base_url());
    }

    /// Next trimmed input line; `None` once the user presses Ctrl-C or Ctrl-D
    pub fn read_input(&mut self) -> Result<Option<String>> {
        match self.editor.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if !line.is_empty() {
                    let _ = self.editor.add_history_entry(line);
                }
                Ok(Some(line.to_string()))
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e).context("failed to read input"),
        }
    }

    /// Handle user input (command or chat message)
    ///
    /// Returns true if session should continue, false to exit
    pub async fn handle_input(&mut self, input: &str) -> Result<bool> {
        if input.trim().is_empty() {
            return Ok(true);
        }

        if let Some(command) = self.command_handler.parse(input) {
            return self
                .command_handler
                .execute(command, &mut self.chat, &self.display_manager)
                .await;
        }

        self.send_message(input.trim()).await;
        Ok(true)
    }

    /// Send one message and render the reply
    ///
    /// Request failures are reported inline and never end the session.
    pub async fn send_message(&mut self, text: &str) {
        let spinner = self
            .display_manager
            .start_waiting(&format!("Waiting for {}...", self.chat.client().model()));
        let mut renderer = TerminalRenderer::stdout(true)
            .with_header("Assistant:")
            .with_waiting(spinner);

        let outcome = tokio::select! {
            result = self.chat.send(text, &mut renderer) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        self.display_manager.finish_current();

        match outcome {
            Some(Ok(completion)) => {
                let stats = GenerationStats::from_completion(&completion);
                self.display_manager.show_summary(&stats, self.show_speed_bar);
            }
            // already rendered by on_error
            Some(Err(_)) => println!(),
            None => println!("\n{}", "Response cancelled.".yellow()),
        }
    }

    /// Run until exit, EOF or interrupt, then persist history
    pub async fn run(&mut self) -> Result<()> {
        while let Some(input) = self.read_input()? {
            if !self.handle_input(&input).await? {
                break;
            }
        }
        self.save()
    }

    /// Get chat session (immutable)
    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    /// Get chat session (mutable)
    pub fn chat_mut(&mut self) -> &mut ChatSession {
        &mut self.chat
    }

    /// Get display manager
    pub fn display(&self) -> &DisplayManager {
        &self.display_manager
    }

    /// Write the input history, creating its directory if needed
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = &self.history_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        self.editor
            .save_history(path)
            .with_context(|| format!("failed to save history to {}", path.display()))
    }
}
