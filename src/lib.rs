//! vllm-chat - streaming terminal chat for OpenAI-compatible servers
//!
//! A thin client around an inference server exposing the chat-completions
//! API: it streams the reply as server-sent events, parses partial JSON
//! frames incrementally and reports a live tokens-per-second rate.
//!
//! # Architecture
//!
//! - **streaming**: byte decoding, frame parsing, phase machine, HTTP client
//! - **session**: conversation ownership and result folding
//! - **context / telemetry**: token budgeting and generation statistics
//! - **cli / repl**: argument parsing, TOML config, interactive loop

pub mod context;
pub mod errors;
pub mod session;
pub mod streaming;
pub mod telemetry;
pub mod types;

pub mod cli;
pub mod repl;

// Re-export commonly used types
pub use errors::{ChatError, Result};
pub use session::ChatSession;
pub use streaming::{ChatClient, ClientConfig, Completion, StreamEvent, StreamSink};
pub use types::{Conversation, Message, Role};
