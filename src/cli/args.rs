//! Command-line argument parsing for vllm-chat
//!
//! Every connection setting can come from a flag or its environment
//! variable; unset values fall through to the config file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// vllm-chat - streaming terminal chat for OpenAI-compatible servers
#[derive(Parser, Debug)]
#[command(name = "vllm-chat")]
#[command(version)]
#[command(about = "Chat with a local vLLM (or any OpenAI-compatible) server", long_about = None)]
pub struct Args {
    /// Send one prompt, print the reply and exit
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Model to request
    #[arg(short, long, env = "VLLM_MODEL")]
    pub model: Option<String>,

    /// Server base URL
    #[arg(long, env = "VLLM_API_BASE")]
    pub api_base: Option<String>,

    /// System prompt
    #[arg(short, long, env = "VLLM_SYSTEM_PROMPT")]
    pub system: Option<String>,

    /// Fixed generation limit (derived from the context window when unset)
    #[arg(long, env = "VLLM_MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    /// Model context window in tokens
    #[arg(long)]
    pub context_window: Option<u32>,

    /// Seconds to wait for the next chunk before failing (0 disables)
    #[arg(long, value_name = "SECS")]
    pub stall_timeout: Option<u64>,

    /// Seconds allowed to establish a connection
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// REPL history file
    #[arg(long, value_name = "PATH")]
    pub history_file: Option<PathBuf>,

    /// Skip waiting for the server at startup
    #[arg(long)]
    pub no_wait: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (print only the reply)
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start interactive chat (default)
    Chat,

    /// List models served by the API
    Models,

    /// Display resolved configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Default tracing filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Reject a prompt combined with a subcommand
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.is_some() && matches!(self.command, Some(Commands::Models | Commands::Config)) {
            return Err("Cannot specify a prompt with this subcommand.".to_string());
        }

        if let Some(0) = self.context_window {
            return Err("--context-window must be greater than 0".to_string());
        }

        if let Some(0) = self.connect_timeout {
            return Err("--connect-timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Check if should show spinners and banners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show the live rate line and summaries
    pub fn show_stats(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("vllm-chat").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_are_unset() {
        let args = parse(&[]);
        assert!(args.prompt.is_none());
        assert!(args.command.is_none());
        assert!(!args.no_wait);
        assert_eq!(args.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_flags() {
        let args = parse(&[
            "--model",
            "m",
            "--api-base",
            "http://gpu:9000",
            "--max-tokens",
            "256",
            "--stall-timeout",
            "5",
            "-s",
            "be brief",
        ]);
        assert_eq!(args.model.as_deref(), Some("m"));
        assert_eq!(args.api_base.as_deref(), Some("http://gpu:9000"));
        assert_eq!(args.max_tokens, Some(256));
        assert_eq!(args.stall_timeout, Some(5));
        assert_eq!(args.system.as_deref(), Some("be brief"));
    }

    #[test]
    fn test_one_shot_prompt() {
        let args = parse(&["what is rust?"]);
        assert_eq!(args.prompt.as_deref(), Some("what is rust?"));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&["-q"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["-v"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["-vv"]).verbosity(), Verbosity::VeryVerbose);
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(parse(&[]).log_filter(), "warn");
        assert_eq!(parse(&["-v"]).log_filter(), "info");
        assert_eq!(parse(&["-vv"]).log_filter(), "debug");
        assert_eq!(parse(&["-vvv"]).log_filter(), "trace");
        assert_eq!(parse(&["-q"]).log_filter(), "error");
    }

    #[test]
    fn test_subcommands() {
        assert_eq!(parse(&["models"]).command, Some(Commands::Models));
        assert_eq!(parse(&["config"]).command, Some(Commands::Config));
        assert_eq!(parse(&["chat"]).command, Some(Commands::Chat));
    }

    #[test]
    fn test_validate_rejects_zero_context_window() {
        let args = parse(&["--context-window", "0"]);
        assert!(args.validate().is_err());
        assert!(parse(&["--connect-timeout", "0"]).validate().is_err());
    }

    #[test]
    fn test_verbosity_methods() {
        assert!(!Verbosity::Quiet.show_progress());
        assert!(Verbosity::Normal.show_progress());
        assert!(!Verbosity::Quiet.show_stats());
        assert_eq!(Verbosity::VeryVerbose.as_str(), "very_verbose");
    }
}
