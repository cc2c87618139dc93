//! Command handler for REPL built-in commands
//!
//! Commands are matched case-insensitively with or without a leading `/`.
//! Any other input is a chat message.

use crate::repl::display::DisplayManager;
use crate::session::ChatSession;
use anyhow::Result;
use colored::*;

/// REPL command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    Clear,
    Stats,
    Models,
}

/// Command handler for parsing and executing REPL commands
#[derive(Debug, Default)]
pub struct CommandHandler;

impl CommandHandler {
    /// Create new command handler
    pub fn new() -> Self {
        CommandHandler
    }

    /// Parse input into a command, `None` for a chat message
    pub fn parse(&self, input: &str) -> Option<Command> {
        let trimmed = input.trim();
        let word = trimmed.strip_prefix('/').unwrap_or(trimmed);

        match word.to_lowercase().as_str() {
            "help" | "?" => Some(Command::Help),
            "exit" | "quit" => Some(Command::Exit),
            "clear" | "reset" => Some(Command::Clear),
            "stats" => Some(Command::Stats),
            "models" => Some(Command::Models),
            _ => None,
        }
    }

    /// Execute a command
    ///
    /// Returns true if REPL should continue, false if should exit
    pub async fn execute(
        &mut self,
        command: Command,
        chat: &mut ChatSession,
        display: &DisplayManager,
    ) -> Result<bool> {
        match command {
            Command::Help => {
                self.show_help();
                Ok(true)
            }
            Command::Exit => {
                println!("{}", "Goodbye!".green());
                Ok(false)
            }
            Command::Clear => {
                chat.clear();
                let _ = display.clear_screen();
                println!("{}", "Conversation cleared.".yellow());
                Ok(true)
            }
            Command::Stats => {
                display.show_session_stats(chat.stats(), chat.conversation().len());
                Ok(true)
            }
            Command::Models => {
                match chat.client().list_models().await {
                    Ok(models) => display.show_models(&models, chat.client().model()),
                    Err(e) => display.show_error(&e.user_message()),
                }
                Ok(true)
            }
        }
    }

    /// Display help information
    fn show_help(&self) {
        println!("\n{}", "Available Commands:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());

        let commands = [
            ("help, ?", "Show this help message"),
            ("clear, reset", "Clear the conversation (keeps the system prompt)"),
            ("stats", "Show generation statistics for this session"),
            ("models", "List models served by the API"),
            ("exit, quit", "Exit"),
        ];

        for (cmd, desc) in commands {
            println!("  {:<20} {}", cmd.green(), desc);
        }

        println!("\n{}", "Usage:".bold());
        println!("  - Anything else is sent to the model");
        println!("  - Commands also accept a {} prefix", "/".cyan());
        println!("  - Use {} for input history", "UP/DOWN arrows".cyan());
        println!("  - Press {} or {} to exit", "Ctrl-D".cyan(), "exit".cyan());
        println!();
    }
}
