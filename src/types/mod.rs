//! Core types for vllm-chat

pub mod messages;

pub use messages::{Conversation, Message, Role};
