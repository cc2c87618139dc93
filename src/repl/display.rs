//! Display manager for REPL terminal UI
//!
//! Banner, waiting spinner, per-response summaries and session statistics

use crate::telemetry::{speed_bar, speed_percentage, GenerationStats, SessionStats};
use colored::*;
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::time::Duration;

/// Cells in the speed bar
const SPEED_BAR_WIDTH: usize = 20;

/// Display manager for REPL UI
pub struct DisplayManager {
    current_bar: Option<ProgressBar>,
    update_interval: Duration,
}

impl DisplayManager {
    /// Create new display manager
    ///
    /// Spinner frequency: 10 FPS (100ms interval)
    pub fn new() -> Self {
        DisplayManager {
            current_bar: None,
            update_interval: Duration::from_millis(100),
        }
    }

    /// Show welcome banner
    pub fn show_banner(&self, version: &str, model: &str, api_base: &str) {
        let width = 64;
        let title = format!("  vllm-chat {} - Streaming Terminal Chat", version);
        let info = format!("  Model: {} | Server: {}", model, api_base);

        println!("\n{}", "=".repeat(width).cyan());
        println!("{}", title.bold().cyan());
        println!("{}", info.dimmed());
        println!("{}\n", "=".repeat(width).cyan());
        println!(
            "Type a message (or {} for commands, {} to quit)\n",
            "help".green(),
            "exit".green()
        );
    }

    /// Spinner shown until the first delta arrives
    pub fn start_waiting(&mut self, message: &str) -> ProgressBar {
        self.finish_current();

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(self.update_interval);

        self.current_bar = Some(pb.clone());
        pb
    }

    /// Finish current spinner
    pub fn finish_current(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_and_clear();
        }
    }

    /// Show the one-line summary after a response
    pub fn show_summary(&self, stats: &GenerationStats, with_speed_bar: bool) {
        let mut line = format!("{} {}", stats.tier().icon(), stats.summary());
        if with_speed_bar {
            line.push_str(&format!(
                "  {} {}%",
                speed_bar(stats.tokens_per_second, SPEED_BAR_WIDTH),
                speed_percentage(stats.tokens_per_second)
            ));
        }
        println!("{}", line.dimmed());

        if stats.truncated {
            self.show_warning("The server closed the stream early; the reply may be incomplete.");
        }
        println!();
    }

    /// Show session totals
    pub fn show_session_stats(&self, stats: &SessionStats, messages: usize) {
        self.show_section("Session Statistics:");
        println!("  Responses:        {}", stats.responses.to_string().green());
        println!("  Failed Requests:  {}", stats.failures.to_string().red());
        println!("  Total Tokens:     {}", stats.total_tokens.to_string().green());
        println!(
            "  Total Time:       {}",
            format!("{:.1}s", stats.total_time.as_secs_f64()).green()
        );
        println!(
            "  Average Speed:    {}",
            format!("{} tokens/s", stats.average_tokens_per_second()).green()
        );
        println!("  Messages:         {}", messages.to_string().green());

        if let Some(last) = &stats.last {
            println!("  Last Response:    {}", last.summary().dimmed());
        }
        println!();
    }

    /// Show models served by the API, marking the active one
    pub fn show_models(&self, models: &[String], current: &str) {
        if models.is_empty() {
            self.show_warning("The server reports no models.");
            return;
        }

        self.show_section(&format!("Available Models ({}):", models.len()));
        for model in models {
            if model == current {
                println!("  {} {}", "•".green(), model.green().bold());
            } else {
                println!("  {} {}", "•".cyan(), model);
            }
        }
        println!();
    }

    /// Display error message
    pub fn show_error(&self, error: &str) {
        println!("{} {}", "Error:".red().bold(), error.red());
    }

    /// Display warning message
    pub fn show_warning(&self, warning: &str) {
        println!("{} {}", "Warning:".yellow().bold(), warning.yellow());
    }

    /// Display info message
    pub fn show_info(&self, info: &str) {
        println!("{} {}", "Info:".cyan(), info);
    }

    /// Show section header
    pub fn show_section(&self, title: &str) {
        println!("\n{}", title.bold().cyan());
        println!("{}", "=".repeat(60).cyan());
    }

    /// Clear screen
    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0))
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}
