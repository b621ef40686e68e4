//! HTTP client for `POST /v1/chat/completions`
//!
//! The response `Content-Type` selects the branch: `text/event-stream` is fed
//! through a [`StreamAccumulator`], anything else is parsed as one JSON
//! document. Transport failures and non-2xx statuses are returned as errors;
//! errors embedded in a stream follow the configured [`StreamErrorPolicy`].

use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::accumulator::{CompletionEvent, EventSender, Flow, StreamAccumulator, StreamErrorPolicy};
use super::types::{extract_error_message, ChatCompletion, ChatRequest, Message};
use crate::config::{Config, ServerConfig};
use crate::error::{ChatError, Result};

/// Path of the completions endpoint relative to the server base URL
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

const FALLBACK_ERROR_MESSAGE: &str = "Failed to get chat completion";

/// Client for an OpenAI-compatible chat-completions server
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    request_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    error_policy: StreamErrorPolicy,
}

impl ChatClient {
    /// Create a client from server settings
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use bodhi_chat::completion::{ChatClient, StreamErrorPolicy};
    /// use bodhi_chat::config::ServerConfig;
    ///
    /// let client = ChatClient::new(&ServerConfig::default(), StreamErrorPolicy::Abort).unwrap();
    /// assert_eq!(client.endpoint(), "http://localhost:1135/v1/chat/completions");
    /// ```
    pub fn new(server: &ServerConfig, error_policy: StreamErrorPolicy) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(server.connect_timeout_seconds))
            .user_agent(concat!("bodhi-chat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!(base_url = %server.base_url, "Initialized chat client");

        Ok(Self {
            http,
            base_url: server.base_url.trim_end_matches('/').to_string(),
            api_key: server.api_key.clone().filter(|k| !k.is_empty()),
            request_timeout: server.request_timeout_seconds.map(Duration::from_secs),
            idle_timeout: server.stream_idle_timeout_seconds.map(Duration::from_secs),
            error_policy,
        })
    }

    /// Create a client from the full configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.server, config.chat.stream_error_policy)
    }

    /// Full URL of the completions endpoint
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH)
    }

    /// Send a completion request and wait for the assistant reply
    ///
    /// Streaming responses emit [`CompletionEvent::State`],
    /// [`CompletionEvent::Delta`] and finally [`CompletionEvent::Finished`].
    /// Non-streaming responses emit exactly one [`CompletionEvent::Message`].
    ///
    /// # Arguments
    ///
    /// * `request` - OpenAI-shaped request body
    /// * `events` - Optional channel receiving progress events
    /// * `cancel` - Token that aborts the request and closes the connection
    ///
    /// # Errors
    ///
    /// - [`ChatError::Transport`] on network failures
    /// - [`ChatError::Api`] on non-2xx statuses
    /// - [`ChatError::UpstreamStream`] on an in-band error under `Abort`
    /// - [`ChatError::StreamTimeout`] when the idle timeout elapses
    /// - [`ChatError::Cancelled`] when `cancel` fires
    pub async fn send(
        &self,
        request: &ChatRequest,
        events: Option<EventSender>,
        cancel: &CancellationToken,
    ) -> Result<Message> {
        let url = self.endpoint();
        tracing::debug!(
            %url,
            model = %request.model,
            messages = request.messages.len(),
            stream = request.is_streaming(),
            "Sending chat completion request"
        );

        let mut builder = self.http.post(&url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        // streamed bodies are bounded by the idle timeout only
        if !request.is_streaming() {
            if let Some(timeout) = self.request_timeout {
                builder = builder.timeout(timeout);
            }
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Chat completion cancelled before response");
                return Err(ChatError::Cancelled { partial: String::new() }.into());
            }
            result = builder.send() => result.map_err(|e| {
                tracing::error!("Chat completion request failed: {}", e);
                ChatError::Transport(e)
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body)
                .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string());
            tracing::error!(status = status.as_u16(), %message, "Chat completion returned error");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("text/event-stream") {
            let accumulator = StreamAccumulator::new(self.error_policy, events);
            accumulate_stream(response.bytes_stream(), accumulator, cancel, self.idle_timeout)
                .await
        } else {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ChatError::Cancelled { partial: String::new() }.into());
                }
                body = response.text() => body.map_err(ChatError::Transport)?,
            };
            let completion: ChatCompletion = serde_json::from_str(&body).map_err(|e| {
                tracing::error!("Failed to parse chat completion: {}", e);
                ChatError::InvalidResponse(format!("Failed to parse chat completion: {}", e))
            })?;
            let message = completion.into_message()?;
            if let Some(tx) = &events {
                let _ = tx.send(CompletionEvent::Message(message.clone()));
            }
            Ok(message)
        }
    }
}

/// Drive an accumulator from a byte stream until it ends
///
/// The loop stops on the `[DONE]` terminator, on body exhaustion, on an
/// in-band error (under `Abort`), on a transport error, when `idle_timeout`
/// elapses between two chunks, or when `cancel` fires. Returning drops the
/// stream, which closes the underlying connection.
pub async fn accumulate_stream<S>(
    byte_stream: S,
    mut accumulator: StreamAccumulator,
    cancel: &CancellationToken,
    idle_timeout: Option<Duration>,
) -> Result<Message>
where
    S: Stream<Item = reqwest::Result<Bytes>>,
{
    tokio::pin!(byte_stream);
    accumulator.begin();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Chat completion stream cancelled");
                accumulator.fail();
                return Err(ChatError::Cancelled {
                    partial: accumulator.content().to_string(),
                }
                .into());
            }
            next = next_chunk(&mut byte_stream, idle_timeout) => next,
        };

        match next {
            Ok(Some(Ok(bytes))) => match accumulator.push_bytes(&bytes) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Done) => break,
                Err(e) => return Err(e.into()),
            },
            Ok(Some(Err(e))) => {
                tracing::error!("Chat completion stream failed: {}", e);
                accumulator.fail();
                return Err(ChatError::Transport(e).into());
            }
            Ok(None) => break,
            Err(seconds) => {
                tracing::warn!(seconds, "Chat completion stream stalled");
                accumulator.fail();
                return Err(ChatError::StreamTimeout(seconds).into());
            }
        }
    }

    let message = accumulator.finish()?;
    tracing::debug!(
        chars = message.content.len(),
        has_metadata = message.metadata.is_some(),
        "Chat completion stream finished"
    );
    Ok(message)
}

/// Next chunk, or the idle timeout in seconds when it elapsed first
async fn next_chunk<S>(
    stream: &mut std::pin::Pin<&mut S>,
    idle_timeout: Option<Duration>,
) -> std::result::Result<Option<S::Item>, u64>
where
    S: Stream,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| limit.as_secs()),
        None => Ok(stream.next().await),
    }
}
