//! Streaming chat completion client
//!
//! Bytes from the HTTP body flow through a stateful UTF-8 decoder and a
//! line buffer, each `data: ` line is classified and parsed, and content
//! deltas accumulate in a `StreamingState` while being pushed to a sink.

pub mod client;
pub mod decoder;
pub mod frame;
pub mod processor;
pub mod sink;
pub mod state;

// Re-export commonly used types
pub use client::{
    normalize_base_url, ChatClient, ClientConfig, DEFAULT_API_BASE, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_MODEL, DEFAULT_STALL_TIMEOUT, DEFAULT_SYSTEM_PROMPT,
};
pub use decoder::{LineReader, MAX_LINE_SIZE};
pub use frame::{DeltaPayload, StreamFrame};
pub use processor::ResponseProcessor;
pub use sink::{CallbackSink, ChannelSink, NullSink, StreamEvent, StreamSink, EVENT_CHANNEL_CAPACITY};
pub use state::{tokens_per_second, Completion, FinishReason, StreamPhase, StreamingState};
