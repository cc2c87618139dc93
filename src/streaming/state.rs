//! Per-request streaming state and request phase machine
//!
//! `StreamingState` is owned by exactly one in-flight request. It is created
//! when the request starts, mutated once per accepted delta, and consumed
//! into a `Completion` when the stream ends. Nothing else holds it.
//!
//! # Phase machine
//!
//! ```text
//! Idle      → Sending    (on: Send)
//! Sending   → Streaming  (on: ChunkReceived)
//! Sending   → Completed  (on: Finish)       empty 2xx body
//! Sending   → Failed     (on: Fail)         non-2xx, connect error
//! Streaming → Streaming  (on: ChunkReceived)
//! Streaming → Completed  (on: Finish)
//! Streaming → Failed     (on: Fail)
//! Completed → Idle       (on: Reset)
//! Failed    → Idle       (on: Reset)
//! ```

use crate::errors::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Elapsed time floor for the rate computation, avoids dividing by ~0
pub const MIN_RATE_WINDOW: Duration = Duration::from_millis(100);

/// Lifecycle of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamPhase {
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
}

/// Events driving `StreamPhase`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Send,
    ChunkReceived,
    Finish,
    Fail,
    Reset,
}

impl StreamPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamPhase::Completed | StreamPhase::Failed)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, StreamPhase::Sending | StreamPhase::Streaming)
    }

    pub fn transition(&self, event: PhaseEvent) -> Result<StreamPhase> {
        use PhaseEvent::*;
        use StreamPhase::*;

        let next = match (self, event) {
            (Idle, Send) => Sending,
            (Sending, ChunkReceived) => Streaming,
            (Sending, Finish) => Completed,
            (Sending, Fail) => Failed,
            (Streaming, ChunkReceived) => Streaming,
            (Streaming, Finish) => Completed,
            (Streaming, Fail) => Failed,
            (Completed, Reset) | (Failed, Reset) => Idle,
            (from, event) => {
                return Err(ChatError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                    reason: format!("No transition from {:?} on {:?}", from, event),
                });
            }
        };

        Ok(next)
    }
}

impl Default for StreamPhase {
    fn default() -> Self {
        StreamPhase::Idle
    }
}

/// How a successful stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    /// `data: [DONE]` was seen
    Sentinel,

    /// Body ended without the sentinel; text may be truncated
    Eof,
}

/// Final result of a successful stream
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub token_count: u64,
    pub tokens_per_second: u64,
    pub elapsed: Duration,
    pub finish: FinishReason,
}

impl Completion {
    pub fn is_truncated(&self) -> bool {
        self.finish == FinishReason::Eof
    }
}

/// Tokens-per-second as `round(count / elapsed)`
pub fn tokens_per_second(token_count: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.max(MIN_RATE_WINDOW).as_secs_f64();
    (token_count as f64 / secs).round() as u64
}

/// Mutable state of one in-flight request
#[derive(Debug, Clone)]
pub struct StreamingState {
    text: String,
    token_count: u64,
    tokens_per_second: u64,
    started: Instant,
    last_update: Instant,
}

impl StreamingState {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(started: Instant) -> Self {
        Self {
            text: String::new(),
            token_count: 0,
            tokens_per_second: 0,
            started,
            last_update: started,
        }
    }

    /// Accept one content increment, returns the new rate
    pub fn apply_delta(&mut self, content: &str) -> u64 {
        self.apply_delta_at(content, Instant::now())
    }

    /// Accept one content increment observed at `now`
    pub fn apply_delta_at(&mut self, content: &str, now: Instant) -> u64 {
        self.text.push_str(content);
        self.token_count += 1;
        self.last_update = now;
        self.tokens_per_second =
            tokens_per_second(self.token_count, now.saturating_duration_since(self.started));
        self.tokens_per_second
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    pub fn tokens_per_second(&self) -> u64 {
        self.tokens_per_second
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Time from request start to the last accepted delta
    pub fn elapsed(&self) -> Duration {
        self.last_update.saturating_duration_since(self.started)
    }

    /// Fold into the final result
    pub fn finish(self, finish: FinishReason) -> Completion {
        let elapsed = self.started.elapsed();
        Completion {
            tokens_per_second: self.tokens_per_second,
            token_count: self.token_count,
            text: self.text,
            elapsed,
            finish,
        }
    }
}

impl Default for StreamingState {
    fn default() -> Self {
        Self::new()
    }
}
