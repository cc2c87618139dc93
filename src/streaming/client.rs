//! OpenAI-compatible chat-completions streaming client
//!
//! - `POST {base}/v1/chat/completions` with `stream: true`
//! - `GET  {base}/v1/models` for model listing and readiness
//!
//! One request may be in flight per client (clones share the guard).

use crate::context::{available_completion_tokens, DEFAULT_CONTEXT_WINDOW};
use crate::errors::{ChatError, Result};
use crate::streaming::processor::ResponseProcessor;
use crate::streaming::sink::{ChannelSink, StreamEvent, StreamSink, EVENT_CHANNEL_CAPACITY};
use crate::streaming::state::{Completion, PhaseEvent, StreamPhase, StreamingState};
use crate::types::Conversation;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default server base URL
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// Default model
pub const DEFAULT_MODEL: &str = "Qwen/QwQ-32B-AWQ";

/// Default system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful, respectful and honest assistant. Always answer as helpfully as possible.";

/// Connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest wait for the next body chunk (60 seconds)
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(60);

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
const MODELS_PATH: &str = "/v1/models";

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub model: String,

    /// Fixed generation limit; derived from `context_window` when `None`
    pub max_tokens: Option<u32>,
    pub context_window: u32,
    pub connect_timeout: Duration,
    pub stall_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            context_window: DEFAULT_CONTEXT_WINDOW,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stall_timeout: Some(DEFAULT_STALL_TIMEOUT),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            model: model.to_string(),
            ..Default::default()
        }
    }
}

/// Reduce a configured URL to the server root
///
/// Accepts `http://host:8000`, `http://host:8000/`, `http://host:8000/v1`
/// and the full `http://host:8000/v1/chat/completions`.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let root = match trimmed.find("/v1/") {
        Some(idx) => &trimmed[..idx],
        None => trimmed.strip_suffix("/v1").unwrap_or(trimmed),
    };
    root.to_string()
}

/// Chat-completions request body
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a Conversation,
    stream: bool,
    max_tokens: u32,
}

/// `GET /v1/models` response
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    id: String,
}

/// Releases the in-flight flag on drop, including when the request future is dropped
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Streaming chat client
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    config: ClientConfig,
    in_flight: Arc<AtomicBool>,
}

impl ChatClient {
    /// Create client with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create client with custom configuration
    pub fn with_config(mut config: ClientConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(ChatError::Config("model must not be empty".to_string()));
        }
        config.base_url = normalize_base_url(&config.base_url);
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(ChatError::Config(format!(
                "base URL must start with http:// or https://, got '{}'",
                config.base_url
            )));
        }

        // no total timeout: long generations are legal, stalls are bounded per chunk
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(ChatError::Http)?;

        Ok(Self {
            client,
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}{}", self.config.base_url, CHAT_COMPLETIONS_PATH)
    }

    pub fn models_url(&self) -> String {
        format!("{}{}", self.config.base_url, MODELS_PATH)
    }

    /// Whether a streaming request is currently outstanding
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Generation limit for a request carrying `conversation`
    pub fn max_tokens_for(&self, conversation: &Conversation) -> u32 {
        self.config
            .max_tokens
            .unwrap_or_else(|| available_completion_tokens(conversation, self.config.context_window))
    }

    pub(crate) fn try_begin(&self) -> Result<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ChatError::RequestInFlight)?;

        Ok(InFlightGuard {
            flag: Arc::clone(&self.in_flight),
        })
    }

    /// Send `conversation` and stream the reply into `sink`
    ///
    /// Calls `on_delta` per accepted delta, then exactly one of `on_done`
    /// or `on_error`. The conversation is not touched; folding the reply
    /// into it is the caller's job.
    pub async fn send_and_stream<S>(&self, conversation: &Conversation, sink: &mut S) -> Result<Completion>
    where
        S: StreamSink + ?Sized,
    {
        let guard = match self.try_begin() {
            Ok(guard) => guard,
            Err(e) => {
                sink.on_error(&e.user_message());
                return Err(e);
            }
        };
        self.run_request(guard, conversation, sink).await
    }

    /// Pull-based variant of `send_and_stream`
    ///
    /// The request runs on a spawned task. The receiver yields deltas and
    /// then exactly one `Done` or `Error`. Dropping the receiver cancels the
    /// request: the connection is closed, the partial text is discarded and
    /// the client is free again.
    pub fn stream_events(&self, conversation: Conversation) -> Result<mpsc::Receiver<StreamEvent>> {
        let guard = self.try_begin()?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let client = self.clone();

        tokio::spawn(async move {
            let mut sink = ChannelSink::new(tx.clone());
            let outcome = tokio::select! {
                result = client.run_request(guard, &conversation, &mut sink) => Some(result),
                _ = tx.closed() => None,
            };

            let terminal = match outcome {
                Some(Ok(completion)) => StreamEvent::Done {
                    text: completion.text,
                    finish: completion.finish,
                },
                Some(Err(e)) => StreamEvent::Error {
                    message: e.user_message(),
                },
                None => {
                    debug!("event receiver dropped, request cancelled");
                    return;
                }
            };
            let _ = tx.send(terminal).await;
        });

        Ok(rx)
    }

    async fn run_request<S>(&self, _guard: InFlightGuard, conversation: &Conversation, sink: &mut S) -> Result<Completion>
    where
        S: StreamSink + ?Sized,
    {
        match self.execute(conversation, sink).await {
            Ok(completion) => {
                sink.on_done(&completion.text);
                Ok(completion)
            }
            Err(e) => {
                warn!(error = %e, "chat request failed");
                sink.on_error(&e.user_message());
                Err(e)
            }
        }
    }

    async fn execute<S>(&self, conversation: &Conversation, sink: &mut S) -> Result<Completion>
    where
        S: StreamSink + ?Sized,
    {
        let phase = StreamPhase::Idle.transition(PhaseEvent::Send)?;
        let state = StreamingState::new();
        let url = self.chat_completions_url();

        let request = ChatRequest {
            model: &self.config.model,
            messages: conversation,
            stream: true,
            max_tokens: self.max_tokens_for(conversation),
        };

        debug!(
            url = %url,
            model = %self.config.model,
            messages = conversation.len(),
            max_tokens = request.max_tokens,
            "sending chat completion request"
        );

        let send = self
            .client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(&request)
            .send();
        let response = self.within_stall_timeout(send).await??;

        let status = response.status();
        if !status.is_success() {
            let body = match self.within_stall_timeout(response.text()).await {
                Ok(Ok(body)) => body,
                _ => "Unknown error".to_string(),
            };
            let phase = phase.transition(PhaseEvent::Fail)?;
            debug!(status = status.as_u16(), ?phase, "server rejected request");
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }

        ResponseProcessor::new(state)
            .with_stall_timeout(self.config.stall_timeout)
            .run(response.bytes_stream(), sink)
            .await
    }

    /// Bound a wait that happens outside the body stream by the stall timeout
    async fn within_stall_timeout<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        match self.config.stall_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| ChatError::Timeout {
                    duration_ms: limit.as_millis() as u64,
                }),
            None => Ok(fut.await),
        }
    }

    /// List model ids served at `/v1/models`
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self.client.get(self.models_url()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let models: ModelsResponse = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    /// Check if the server answers `/v1/models`
    pub async fn health_check(&self) -> bool {
        match self.client.get(self.models_url()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }

    /// Poll the server until it is up, at most `max_attempts` times
    pub async fn wait_for_server(&self, max_attempts: u32, delay: Duration) -> bool {
        for attempt in 1..=max_attempts {
            if self.health_check().await {
                info!(attempt, "server is ready");
                return true;
            }
            debug!(attempt, max_attempts, "server not ready yet");
            if attempt < max_attempts {
                tokio::time::sleep(delay).await;
            }
        }
        warn!(max_attempts, "server did not become available");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::sink::NullSink;
    use crate::types::Message;

    #[test]
    fn test_client_creation() {
        let client = ChatClient::new().unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.base_url(), DEFAULT_API_BASE);
        assert!(!client.is_busy());
    }

    #[test]
    fn test_client_with_config() {
        let client = ChatClient::with_config(ClientConfig::new(
            "http://10.0.0.5:8000/v1/chat/completions",
            "my-model",
        ))
        .unwrap();
        assert_eq!(client.model(), "my-model");
        assert_eq!(client.base_url(), "http://10.0.0.5:8000");
        assert_eq!(client.chat_completions_url(), "http://10.0.0.5:8000/v1/chat/completions");
        assert_eq!(client.models_url(), "http://10.0.0.5:8000/v1/models");
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(ChatClient::with_config(ClientConfig::new("localhost:8000", "m")).is_err());
        assert!(ChatClient::with_config(ClientConfig::new(DEFAULT_API_BASE, "  ")).is_err());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://h:8000"), "http://h:8000");
        assert_eq!(normalize_base_url("http://h:8000/"), "http://h:8000");
        assert_eq!(normalize_base_url("http://h:8000/v1"), "http://h:8000");
        assert_eq!(normalize_base_url("http://h:8000/v1/"), "http://h:8000");
        assert_eq!(normalize_base_url("http://h:8000/v1/chat/completions"), "http://h:8000");
        assert_eq!(normalize_base_url(" https://api.example.com/proxy "), "https://api.example.com/proxy");
    }

    #[test]
    fn test_request_body_shape() {
        let mut conv = Conversation::with_system_prompt("sys");
        conv.push(Message::user("hi"));
        let request = ChatRequest {
            model: "m",
            messages: &conv,
            stream: true,
            max_tokens: 64,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "m",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"}
                ],
                "stream": true,
                "max_tokens": 64
            })
        );
    }

    #[test]
    fn test_max_tokens_resolution() {
        let conv = Conversation::with_system_prompt("sys");

        let mut config = ClientConfig::default();
        config.max_tokens = Some(512);
        let fixed = ChatClient::with_config(config).unwrap();
        assert_eq!(fixed.max_tokens_for(&conv), 512);

        let derived = ChatClient::new().unwrap();
        assert_eq!(
            derived.max_tokens_for(&conv),
            available_completion_tokens(&conv, DEFAULT_CONTEXT_WINDOW)
        );
    }

    #[test]
    fn test_in_flight_guard() {
        let client = ChatClient::new().unwrap();
        let guard = client.try_begin().unwrap();
        assert!(client.is_busy());
        assert!(matches!(client.try_begin(), Err(ChatError::RequestInFlight)));

        // clones share the flag
        let clone = client.clone();
        assert!(clone.is_busy());

        drop(guard);
        assert!(!client.is_busy());
        assert!(client.try_begin().is_ok());
    }

    #[tokio::test]
    async fn test_send_rejected_while_busy() {
        let client = ChatClient::new().unwrap();
        let _guard = client.try_begin().unwrap();

        let result = client
            .send_and_stream(&Conversation::new(), &mut NullSink)
            .await;
        assert!(matches!(result, Err(ChatError::RequestInFlight)));
    }
}
