//! Error types for vllm-chat
//!
//! Transport failures, frame parse failures and local misuse are kept
//! apart so the read loop can tell what is fatal and what is skippable.

use thiserror::Error;

/// Main error type for the chat client
#[derive(Error, Debug)]
pub enum ChatError {
    /// Stream phase machine misuse
    #[error("Invalid stream transition from {from:?} via {event:?}: {reason}")]
    InvalidTransition {
        from: String,
        event: String,
        reason: String,
    },

    /// A send was attempted while another one is still streaming
    #[error("A streaming request is already in flight")]
    RequestInFlight,

    /// Server answered with a non-2xx status
    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    /// Mid-stream failures after the response started
    #[error("Streaming error: {0}")]
    Streaming(String),

    /// Single malformed frame; never escalated past the read loop
    #[error("Frame parse error: {0}")]
    FrameParse(String),

    /// Line buffer grew past its cap without seeing a newline
    #[error("Line buffer overflow: {size} bytes exceeds maximum {max}")]
    BufferOverflow { size: usize, max: usize },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// No chunk arrived within the stall timeout
    #[error("Stream stalled: no data for {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

impl ChatError {
    /// Whether this error belongs to the transport class (surfaced via `on_error`)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChatError::Http(_)
                | ChatError::Api { .. }
                | ChatError::Streaming(_)
                | ChatError::Timeout { .. }
                | ChatError::BufferOverflow { .. }
        )
    }

    /// Text shown to the user when a send fails
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Http(e) if e.is_connect() => {
                "Could not connect to the API server. Make sure it's running.".to_string()
            }
            ChatError::Http(e) if e.is_timeout() => {
                "Timed out connecting to the API server.".to_string()
            }
            ChatError::Api { status, .. } => {
                format!("API request failed with status {}", status)
            }
            ChatError::Timeout { duration_ms } => format!(
                "The server stopped sending data for {:.1}s.",
                *duration_ms as f64 / 1000.0
            ),
            ChatError::RequestInFlight => {
                "Still waiting for the previous response.".to_string()
            }
            other => other.to_string(),
        }
    }
}
