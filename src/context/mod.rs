//! Context window budgeting
//!
//! Derives `max_tokens` for a request from the model's context window and
//! an estimate of how much of it the conversation already uses.

pub mod counter;

pub use counter::TokenCounter;

use crate::types::Conversation;

/// Context window assumed when none is configured
pub const DEFAULT_CONTEXT_WINDOW: u32 = 32_768;

/// Tokens held back from the completion budget
pub const COMPLETION_SAFETY_MARGIN: u32 = 50;

/// Completion tokens left in `context_window` after `conversation`
///
/// ```text
/// available = max(1, window − estimate_conversation(C) − 50)
/// ```
pub fn available_completion_tokens(conversation: &Conversation, context_window: u32) -> u32 {
    let used = TokenCounter::new().estimate_conversation(conversation);
    let used = u32::try_from(used).unwrap_or(u32::MAX);

    context_window
        .saturating_sub(used)
        .saturating_sub(COMPLETION_SAFETY_MARGIN)
        .max(1)
}
