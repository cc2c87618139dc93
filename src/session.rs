//! Chat session: one conversation driven through one client
//!
//! The session is the only writer of the conversation. A send appends the
//! user message first; the assistant reply is appended only after the
//! stream completes, so a failed or cancelled send leaves no partial
//! assistant message behind. A send rejected because another request is
//! in flight leaves the conversation untouched.

use crate::errors::{ChatError, Result};
use crate::streaming::{ChatClient, Completion, StreamSink};
use crate::telemetry::SessionStats;
use crate::types::{Conversation, Message};
use tracing::debug;

pub struct ChatSession {
    client: ChatClient,
    conversation: Conversation,
    system_prompt: Option<String>,
    stats: SessionStats,
}

impl ChatSession {
    /// Create a session, seeded with `system_prompt` when given
    pub fn new(client: ChatClient, system_prompt: Option<String>) -> Self {
        let system_prompt = system_prompt.filter(|p| !p.trim().is_empty());
        let conversation = match &system_prompt {
            Some(prompt) => Conversation::with_system_prompt(prompt.clone()),
            None => Conversation::new(),
        };

        Self {
            client,
            conversation,
            system_prompt,
            stats: SessionStats::default(),
        }
    }

    /// Append `user_text` and stream the assistant reply into `sink`
    pub async fn send<S>(&mut self, user_text: &str, sink: &mut S) -> Result<Completion>
    where
        S: StreamSink + ?Sized,
    {
        self.conversation.push(Message::user(user_text));

        match self.client.send_and_stream(&self.conversation, sink).await {
            Ok(completion) => {
                self.conversation.push(Message::assistant(completion.text.clone()));
                self.stats.record(&completion);
                debug!(
                    messages = self.conversation.len(),
                    tokens = completion.token_count,
                    "assistant reply appended"
                );
                Ok(completion)
            }
            Err(ChatError::RequestInFlight) => {
                self.conversation.pop();
                Err(ChatError::RequestInFlight)
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    /// Reset to the system prompt only
    pub fn clear(&mut self) {
        self.conversation.clear_keep_system();
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}
