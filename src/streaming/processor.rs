//! Streaming response read loop
//!
//! Consumes a body of byte chunks, turns them into lines, classifies each
//! line and feeds content deltas into `StreamingState`:
//! - non-`data: ` lines are ignored
//! - `data: [DONE]` stops the loop, bytes after it are never looked at
//! - malformed JSON is logged and skipped, the stream continues
//! - a content delta updates text, count and rate, then calls `on_delta`
//!
//! The loop is generic over any `Stream` of byte chunks so it runs the same
//! against a live `reqwest` body and against synthetic chunks in tests.

use crate::errors::{ChatError, Result};
use crate::streaming::decoder::LineReader;
use crate::streaming::frame::{DeltaPayload, StreamFrame};
use crate::streaming::sink::StreamSink;
use crate::streaming::state::{Completion, FinishReason, PhaseEvent, StreamPhase, StreamingState};
use futures_util::{pin_mut, Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Whether the loop should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFlow {
    Continue,
    Done,
}

/// Read loop over one response body
#[derive(Debug)]
pub struct ResponseProcessor {
    reader: LineReader,
    state: StreamingState,
    phase: StreamPhase,
    stall_timeout: Option<Duration>,
    frames_skipped: usize,
}

impl ResponseProcessor {
    /// Create a processor for a request that has already been sent
    pub fn new(state: StreamingState) -> Self {
        Self {
            reader: LineReader::new(),
            state,
            phase: StreamPhase::Sending,
            stall_timeout: None,
            frames_skipped: 0,
        }
    }

    /// Fail the stream when no chunk arrives within `timeout`
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn with_max_line_size(mut self, max_line_size: usize) -> Self {
        self.reader = LineReader::with_capacity(max_line_size);
        self
    }

    pub fn state(&self) -> &StreamingState {
        &self.state
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Number of `data:` frames dropped because their JSON did not parse
    pub fn frames_skipped(&self) -> usize {
        self.frames_skipped
    }

    /// Drive the loop to the end of `body`
    ///
    /// Does not call `on_done`/`on_error`; the caller routes the returned
    /// result to exactly one of them.
    pub async fn run<St, B, E, S>(mut self, body: St, sink: &mut S) -> Result<Completion>
    where
        St: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
        S: StreamSink + ?Sized,
    {
        match self.read_body(body, sink).await {
            Ok(finish) => {
                self.advance(PhaseEvent::Finish)?;
                debug!(
                    tokens = self.state.token_count(),
                    tokens_per_second = self.state.tokens_per_second(),
                    skipped = self.frames_skipped,
                    finish = ?finish,
                    "stream completed"
                );
                Ok(self.state.finish(finish))
            }
            Err(e) => {
                // discard state; it is never folded into the conversation
                self.advance(PhaseEvent::Fail)?;
                debug!(error = %e, tokens = self.state.token_count(), "stream failed");
                Err(e)
            }
        }
    }

    async fn read_body<St, B, E, S>(&mut self, body: St, sink: &mut S) -> Result<FinishReason>
    where
        St: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
        S: StreamSink + ?Sized,
    {
        pin_mut!(body);

        loop {
            let next = match self.stall_timeout {
                Some(limit) => tokio::time::timeout(limit, body.next())
                    .await
                    .map_err(|_| ChatError::Timeout {
                        duration_ms: limit.as_millis() as u64,
                    })?,
                None => body.next().await,
            };

            match next {
                Some(Ok(chunk)) => {
                    if chunk.as_ref().is_empty() {
                        continue;
                    }
                    self.advance(PhaseEvent::ChunkReceived)?;
                    if self.process_chunk(chunk.as_ref(), sink)? == LineFlow::Done {
                        return Ok(FinishReason::Sentinel);
                    }
                }
                Some(Err(e)) => {
                    return Err(ChatError::Streaming(e.to_string()));
                }
                None => break,
            }
        }

        // body ended: the last line may have had no trailing newline
        if let Some(line) = self.reader.finish()? {
            if self.process_line(&line, sink) == LineFlow::Done {
                return Ok(FinishReason::Sentinel);
            }
        }

        warn!(
            tokens = self.state.token_count(),
            "stream ended without [DONE]; response may be truncated"
        );
        Ok(FinishReason::Eof)
    }

    /// Feed one network read
    pub fn process_chunk<S>(&mut self, chunk: &[u8], sink: &mut S) -> Result<LineFlow>
    where
        S: StreamSink + ?Sized,
    {
        for line in self.reader.feed(chunk)? {
            if self.process_line(&line, sink) == LineFlow::Done {
                return Ok(LineFlow::Done);
            }
        }
        Ok(LineFlow::Continue)
    }

    /// Handle one complete line
    pub fn process_line<S>(&mut self, line: &str, sink: &mut S) -> LineFlow
    where
        S: StreamSink + ?Sized,
    {
        if line.is_empty() {
            return LineFlow::Continue;
        }

        match StreamFrame::classify(line) {
            StreamFrame::Ignored => {
                trace!(line, "ignoring non-data line");
            }
            StreamFrame::Done => {
                trace!("received [DONE]");
                return LineFlow::Done;
            }
            StreamFrame::Data(payload) => match DeltaPayload::parse(payload) {
                Ok(delta) => {
                    if let Some(reason) = delta.finish_reason() {
                        debug!(reason, "server reported finish reason");
                    }
                    if let Some(content) = delta.content() {
                        let rate = self.state.apply_delta(content);
                        sink.on_delta(self.state.text(), rate);
                    }
                }
                Err(e) => {
                    self.frames_skipped += 1;
                    warn!(error = %e, "skipping malformed stream frame");
                }
            },
        }

        LineFlow::Continue
    }

    fn advance(&mut self, event: PhaseEvent) -> Result<()> {
        self.phase = self.phase.transition(event)?;
        Ok(())
    }
}
