//! Caller-facing delivery of streaming progress
//!
//! Two equivalent shapes:
//! - push: implement `StreamSink` and receive `on_delta` / `on_done` / `on_error`
//! - pull: receive `StreamEvent`s from a channel (see `ChatClient::stream_events`)

use crate::streaming::state::FinishReason;
use tokio::sync::mpsc;

/// Channel capacity for pull-based delivery
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Callback interface for one streaming request
///
/// Exactly one of `on_done` / `on_error` is called per request, after any
/// number of `on_delta` calls.
pub trait StreamSink {
    /// Called for every accepted delta with the full text so far
    fn on_delta(&mut self, text: &str, tokens_per_second: u64);

    /// Called once when the stream ends normally
    fn on_done(&mut self, text: &str);

    /// Called once with a user-facing description when the request fails
    fn on_error(&mut self, message: &str);
}

impl<S: StreamSink + ?Sized> StreamSink for &mut S {
    fn on_delta(&mut self, text: &str, tokens_per_second: u64) {
        (**self).on_delta(text, tokens_per_second)
    }

    fn on_done(&mut self, text: &str) {
        (**self).on_done(text)
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message)
    }
}

/// Sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StreamSink for NullSink {
    fn on_delta(&mut self, _text: &str, _tokens_per_second: u64) {}
    fn on_done(&mut self, _text: &str) {}
    fn on_error(&mut self, _message: &str) {}
}

/// Sink built from three closures
pub struct CallbackSink<D, F, E>
where
    D: FnMut(&str, u64),
    F: FnMut(&str),
    E: FnMut(&str),
{
    on_delta: D,
    on_done: F,
    on_error: E,
}

impl<D, F, E> CallbackSink<D, F, E>
where
    D: FnMut(&str, u64),
    F: FnMut(&str),
    E: FnMut(&str),
{
    pub fn new(on_delta: D, on_done: F, on_error: E) -> Self {
        Self {
            on_delta,
            on_done,
            on_error,
        }
    }
}

impl<D, F, E> StreamSink for CallbackSink<D, F, E>
where
    D: FnMut(&str, u64),
    F: FnMut(&str),
    E: FnMut(&str),
{
    fn on_delta(&mut self, text: &str, tokens_per_second: u64) {
        (self.on_delta)(text, tokens_per_second)
    }

    fn on_done(&mut self, text: &str) {
        (self.on_done)(text)
    }

    fn on_error(&mut self, message: &str) {
        (self.on_error)(message)
    }
}

/// Pull-based streaming event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta { text: String, tokens_per_second: u64 },
    Done { text: String, finish: FinishReason },
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

/// Sink that forwards deltas into a bounded channel
///
/// Deltas are sent with `try_send`; when the receiver lags, a dropped delta
/// is superseded by the next one since each carries the full text. The
/// terminal `Done`/`Error` event is built by the owner from the request
/// result and sent with backpressure, so it is never dropped.
pub struct ChannelSink {
    sender: mpsc::Sender<StreamEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<StreamEvent>) -> Self {
        Self { sender }
    }
}

impl StreamSink for ChannelSink {
    fn on_delta(&mut self, text: &str, tokens_per_second: u64) {
        let _ = self.sender.try_send(StreamEvent::Delta {
            text: text.to_string(),
            tokens_per_second,
        });
    }

    fn on_done(&mut self, _text: &str) {}

    fn on_error(&mut self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_sink() {
        let mut deltas = Vec::new();
        let mut done = None;
        let mut errors = Vec::new();
        {
            let mut sink = CallbackSink::new(
                |text: &str, tps: u64| deltas.push((text.to_string(), tps)),
                |text: &str| done = Some(text.to_string()),
                |msg: &str| errors.push(msg.to_string()),
            );
            sink.on_delta("a", 1);
            sink.on_delta("ab", 2);
            sink.on_done("ab");
        }
        assert_eq!(deltas, vec![("a".to_string(), 1), ("ab".to_string(), 2)]);
        assert_eq!(done.as_deref(), Some("ab"));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_mut_ref_forwarding() {
        fn drive<S: StreamSink>(mut sink: S) {
            sink.on_error("boom");
        }

        let mut message = String::new();
        let mut sink = CallbackSink::new(|_: &str, _| {}, |_: &str| {}, |m: &str| message = m.to_string());
        drive(&mut sink);
        drop(sink);
        assert_eq!(message, "boom");
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_deltas_only() {
        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut sink = ChannelSink::new(tx);

        sink.on_delta("Hi", 5);
        sink.on_done("Hi");
        sink.on_error("ignored");

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first,
            StreamEvent::Delta {
                text: "Hi".to_string(),
                tokens_per_second: 5
            }
        );
        assert!(!first.is_terminal());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_terminal_events() {
        let done = StreamEvent::Done {
            text: String::new(),
            finish: FinishReason::Eof,
        };
        let error = StreamEvent::Error {
            message: "x".to_string(),
        };
        assert!(done.is_terminal());
        assert!(error.is_terminal());
    }

    #[tokio::test]
    async fn test_channel_sink_drops_deltas_when_full() {
        let (tx, mut rx) = mpsc::channel(2);
        let mut sink = ChannelSink::new(tx);
        for i in 0..10 {
            sink.on_delta(&"x".repeat(i + 1), 1);
        }
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
