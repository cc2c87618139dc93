//! vllm-chat - Main CLI Entry Point

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vllm_chat::{
    cli::{Args, Commands, Config},
    repl::{DisplayManager, ReplSession, TerminalRenderer},
    telemetry::GenerationStats,
    ChatClient, ChatSession,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    if let Err(message) = args.validate() {
        eprintln!("{} {}", "Error:".red().bold(), message);
        std::process::exit(2);
    }

    let mut config = Config::load(args.config.clone())?;
    config.apply_args(&args)?;

    match &args.command {
        Some(Commands::Models) => list_models(&config).await?,
        Some(Commands::Config) => show_config(&args, &config),
        Some(Commands::Chat) | None => match &args.prompt {
            Some(prompt) => run_once(&args, &config, prompt).await?,
            None => run_repl(&args, &config).await?,
        },
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `-v`/`-q`
fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Build the client and wait for the server to come up
async fn connect(args: &Args, config: &Config) -> Result<ChatClient> {
    let client = ChatClient::with_config(config.client_config())?;
    if args.no_wait {
        return Ok(client);
    }

    let pb = args
        .verbosity()
        .show_progress()
        .then(|| spinner(format!("Connecting to {}...", client.base_url())));

    let ready = client
        .wait_for_server(config.server.startup_attempts, config.startup_delay())
        .await;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if !ready {
        anyhow::bail!(
            "API server at {} is not responding. Make sure it's running.",
            client.base_url()
        );
    }

    match client.list_models().await {
        Ok(models) if !models.iter().any(|m| m == client.model()) => {
            eprintln!(
                "{} model '{}' is not listed by the server (available: {})",
                "Warning:".yellow().bold(),
                client.model(),
                models.join(", ")
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "could not list models"),
    }

    Ok(client)
}

/// Interactive chat
async fn run_repl(args: &Args, config: &Config) -> Result<()> {
    let client = connect(args, config).await?;
    let chat = ChatSession::new(client, config.system_prompt());

    let mut repl = ReplSession::with_history(chat, config.history_path())?;
    repl.set_speed_bar(config.repl.show_speed_bar);
    repl.show_welcome(env!("CARGO_PKG_VERSION"));

    repl.run().await
}

/// Send one prompt and print the reply
async fn run_once(args: &Args, config: &Config, prompt: &str) -> Result<()> {
    let client = connect(args, config).await?;
    let mut chat = ChatSession::new(client, config.system_prompt());

    let show_stats = args.verbosity().show_stats();
    let mut renderer = TerminalRenderer::stdout(show_stats);

    match chat.send(prompt, &mut renderer).await {
        Ok(completion) => {
            if show_stats {
                let stats = GenerationStats::from_completion(&completion);
                eprintln!("{}", stats.summary().dimmed());
                if stats.truncated {
                    eprintln!(
                        "{} the server closed the stream early",
                        "Warning:".yellow().bold()
                    );
                }
            }
            Ok(())
        }
        // already rendered by on_error
        Err(_) => std::process::exit(1),
    }
}

async fn list_models(config: &Config) -> Result<()> {
    let client = ChatClient::with_config(config.client_config())?;
    let display = DisplayManager::new();

    match client.list_models().await {
        Ok(models) => display.show_models(&models, client.model()),
        Err(e) => {
            display.show_error(&e.user_message());
            eprintln!("\nIs the server running at {}?", client.base_url());
            std::process::exit(1);
        }
    }

    Ok(())
}

fn show_config(args: &Args, config: &Config) {
    println!("\n{}", "vllm-chat Configuration".bold().cyan());
    println!("{}", "=".repeat(60).cyan());

    let source = args
        .config
        .clone()
        .or_else(Config::default_path)
        .filter(|p| p.exists())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in defaults".to_string());
    println!("  Config File:     {}", source);
    println!();

    println!("Server:");
    println!("  API Base:        {}", config.server.api_base);
    println!("  Model:           {}", config.server.model);
    println!("  Connect Timeout: {}s", config.server.connect_timeout_secs);
    match config.server.stall_timeout_secs {
        0 => println!("  Stall Timeout:   disabled"),
        secs => println!("  Stall Timeout:   {}s", secs),
    }
    println!();

    println!("Chat:");
    println!(
        "  System Prompt:   {}",
        config.system_prompt().unwrap_or_else(|| "(none)".to_string())
    );
    match config.chat.max_tokens {
        Some(max) => println!("  Max Tokens:      {}", max),
        None => println!(
            "  Max Tokens:      derived from a {}-token context window",
            config.chat.context_window
        ),
    }
    println!();

    println!("REPL:");
    println!("  History File:    {}", config.history_path().display());
    println!("  Verbosity:       {}", args.verbosity().as_str());
    println!();
}
