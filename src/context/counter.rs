//! Token estimation for conversations
//!
//! Character-based heuristic, no tokenizer involved:
//!
//! ```text
//! estimate(text)           = ⌈chars(text) / 4⌉
//! estimate_conversation(C) = ⌊Σ (chars(content) + 10) / 4⌋ + 10
//! ```
//!
//! The per-message overhead covers role tags and chat-template framing.

use crate::types::Conversation;

/// Characters added per message for role and template framing
pub const MESSAGE_OVERHEAD_CHARS: usize = 10;

/// Fixed token buffer added to a conversation estimate
pub const ESTIMATE_BUFFER_TOKENS: usize = 10;

/// Heuristic token counter
#[derive(Debug, Clone, Default)]
pub struct TokenCounter;

impl TokenCounter {
    pub fn new() -> Self {
        Self
    }

    /// Estimate token count for text
    ///
    /// ```
    /// # use vllm_chat::context::TokenCounter;
    /// let counter = TokenCounter::new();
    /// assert_eq!(counter.estimate(&"a".repeat(100)), 25);
    /// ```
    pub fn estimate(&self, text: &str) -> usize {
        // ceiling division to avoid underestimation
        (text.chars().count() + 3) / 4
    }

    /// Estimate tokens used by a whole conversation, framing included
    pub fn estimate_conversation(&self, conversation: &Conversation) -> usize {
        let total_chars: usize = conversation
            .iter()
            .map(|m| m.content.chars().count() + MESSAGE_OVERHEAD_CHARS)
            .sum();

        total_chars / 4 + ESTIMATE_BUFFER_TOKENS
    }
}
