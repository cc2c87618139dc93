//! Configuration management for vllm-chat
//!
//! TOML file with defaults and validation, layered under CLI flags and
//! environment variables.
//! Location: ~/.vllm-chat/config.toml

use crate::cli::args::Args;
use crate::context::DEFAULT_CONTEXT_WINDOW;
use crate::errors::{ChatError, Result};
use crate::streaming::{
    ClientConfig, DEFAULT_API_BASE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MODEL, DEFAULT_STALL_TIMEOUT,
    DEFAULT_SYSTEM_PROMPT,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration for vllm-chat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub repl: ReplConfig,
}

/// Server connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_base: String,
    pub model: String,
    pub connect_timeout_secs: u64,

    /// 0 disables the stall timeout
    pub stall_timeout_secs: u64,

    /// Attempts of the startup readiness check
    pub startup_attempts: u32,
    pub startup_delay_secs: u64,
}

/// Generation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub system_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub context_window: u32,
}

/// Interactive loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    pub history_file: String,
    pub show_speed_bar: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            stall_timeout_secs: DEFAULT_STALL_TIMEOUT.as_secs(),
            startup_attempts: 10,
            startup_delay_secs: 2,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: None,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            history_file: "~/.vllm-chat/history".to_string(),
            show_speed_bar: true,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("Failed to read config {}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ChatError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(config_path) if config_path.exists() => Self::load_from_file(&config_path),
            _ => Ok(Config::default()),
        }
    }

    /// `~/.vllm-chat/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".vllm-chat").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.model.trim().is_empty() {
            return Err(ChatError::Config("model must not be empty".to_string()));
        }

        let base = self.server.api_base.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ChatError::Config(format!(
                "api_base must be an http(s) URL: {}",
                self.server.api_base
            )));
        }

        if self.chat.context_window == 0 {
            return Err(ChatError::Config(
                "context_window must be greater than 0".to_string(),
            ));
        }

        if self.chat.max_tokens == Some(0) {
            return Err(ChatError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.server.connect_timeout_secs == 0 {
            return Err(ChatError::Config(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Layer CLI flags and environment variables over file values
    pub fn apply_args(&mut self, args: &Args) -> Result<()> {
        if let Some(model) = &args.model {
            self.server.model = model.clone();
        }
        if let Some(api_base) = &args.api_base {
            self.server.api_base = api_base.clone();
        }
        if let Some(system) = &args.system {
            self.chat.system_prompt = system.clone();
        }
        if args.max_tokens.is_some() {
            self.chat.max_tokens = args.max_tokens;
        }
        if let Some(window) = args.context_window {
            self.chat.context_window = window;
        }
        if let Some(secs) = args.stall_timeout {
            self.server.stall_timeout_secs = secs;
        }
        if let Some(secs) = args.connect_timeout {
            self.server.connect_timeout_secs = secs;
        }
        if let Some(path) = &args.history_file {
            self.repl.history_file = path.to_string_lossy().into_owned();
        }

        self.validate()
    }

    /// Settings for `ChatClient::with_config`
    pub fn client_config(&self) -> ClientConfig {
        let stall_timeout = match self.server.stall_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        ClientConfig {
            base_url: self.server.api_base.clone(),
            model: self.server.model.clone(),
            max_tokens: self.chat.max_tokens,
            context_window: self.chat.context_window,
            connect_timeout: Duration::from_secs(self.server.connect_timeout_secs),
            stall_timeout,
        }
    }

    /// System prompt, `None` when blank
    pub fn system_prompt(&self) -> Option<String> {
        let prompt = self.chat.system_prompt.trim();
        (!prompt.is_empty()).then(|| self.chat.system_prompt.clone())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ChatError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChatError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ChatError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// REPL history file path
    pub fn history_path(&self) -> PathBuf {
        Self::expand_path(&self.repl.history_file)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.server.startup_delay_secs)
    }
}
