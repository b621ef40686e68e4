//! Streaming completion accumulator
//!
//! [`StreamAccumulator`] is an explicit state machine that consumes the raw
//! bytes of a `text/event-stream` body and assembles the final assistant
//! message. Progress is reported as [`CompletionEvent`]s over an optional
//! unbounded channel; a dropped receiver is ignored.
//!
//! State transitions:
//!
//! ```text
//! Idle --begin--> Streaming --[DONE] / end of body--> Done
//!                     |
//!                     +--in-band error (Abort) / cancel / transport--> Errored
//! ```

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::record::{decode_line, Record};
use super::types::{Message, MessageMetadata, Timings, Usage};
use crate::error::ChatError;

/// Lifecycle of a single completion stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Created, nothing read yet
    Idle,
    /// Reading the response body
    Streaming,
    /// Stream ended and the final message was produced
    Done,
    /// Stream ended with an error; no final message
    Errored,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Streaming => write!(f, "streaming"),
            Self::Done => write!(f, "done"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

/// Notification emitted while a completion is in flight
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEvent {
    /// The accumulator moved to a new state
    State(StreamState),
    /// An incremental piece of assistant text
    Delta(String),
    /// The single message of a non-streaming response
    Message(Message),
    /// The assembled message at the end of a stream
    Finished(Message),
}

/// Sender side of the completion event channel
pub type EventSender = mpsc::UnboundedSender<CompletionEvent>;

/// What to do with an error object embedded in a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorPolicy {
    /// Stop reading and report the error together with the partial content
    #[default]
    Abort,
    /// Log the error and keep accumulating until the stream ends
    Continue,
}

impl std::str::FromStr for StreamErrorPolicy {
    type Err = ChatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(ChatError::Config(format!(
                "Invalid stream error policy: {}. Must be one of: abort, continue",
                other
            ))),
        }
    }
}

/// Whether the caller should keep feeding bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// More input is expected
    Continue,
    /// The `[DONE]` terminator was seen; remaining input is ignored
    Done,
}

/// Incremental parser and accumulator for chat-completion event streams
#[derive(Debug)]
pub struct StreamAccumulator {
    state: StreamState,
    policy: StreamErrorPolicy,
    events: Option<EventSender>,
    buffer: BytesMut,
    terminated: bool,
    content: String,
    model: Option<String>,
    usage: Option<Usage>,
    timings: Option<Timings>,
}

impl StreamAccumulator {
    /// Create an idle accumulator
    ///
    /// # Arguments
    ///
    /// * `policy` - Handling of in-band error objects
    /// * `events` - Optional channel receiving [`CompletionEvent`]s
    pub fn new(policy: StreamErrorPolicy, events: Option<EventSender>) -> Self {
        Self {
            state: StreamState::Idle,
            policy,
            events,
            buffer: BytesMut::new(),
            terminated: false,
            content: String::new(),
            model: None,
            usage: None,
            timings: None,
        }
    }

    /// Current state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Assistant text accumulated so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Metadata captured so far, `None` if no chunk carried any
    pub fn metadata(&self) -> Option<MessageMetadata> {
        MessageMetadata::from_parts(self.model.clone(), self.usage, self.timings)
    }

    /// Move from `Idle` to `Streaming`
    pub fn begin(&mut self) {
        if self.state == StreamState::Idle {
            self.transition(StreamState::Streaming);
        }
    }

    /// Feed one network chunk
    ///
    /// Bytes are buffered until a newline, so records split across chunks
    /// (including multi-byte UTF-8 sequences) decode correctly.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UpstreamStream`] when an embedded error object is
    /// seen under [`StreamErrorPolicy::Abort`]. The accumulator is then
    /// `Errored`.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Result<Flow, ChatError> {
        self.begin();
        if self.terminated || self.state != StreamState::Streaming {
            return Ok(Flow::Done);
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw = self.buffer.split_to(pos + 1);
            let line = String::from_utf8_lossy(&raw[..pos]).into_owned();
            if self.push_line(&line)? == Flow::Done {
                self.buffer.clear();
                return Ok(Flow::Done);
            }
        }
        Ok(Flow::Continue)
    }

    /// Feed one complete line
    ///
    /// # Errors
    ///
    /// Same as [`push_bytes`](Self::push_bytes).
    pub fn push_line(&mut self, line: &str) -> Result<Flow, ChatError> {
        self.begin();
        if self.terminated || self.state != StreamState::Streaming {
            return Ok(Flow::Done);
        }

        match decode_line(line) {
            Record::Ignored => {}
            Record::Done => {
                tracing::debug!("Received stream terminator");
                self.terminated = true;
                return Ok(Flow::Done);
            }
            Record::Malformed(reason) => {
                tracing::warn!(%reason, line = %line.trim(), "Skipping malformed stream record");
            }
            Record::UpstreamError(detail) => {
                let message = detail
                    .message
                    .unwrap_or_else(|| "Unknown error in completion stream".to_string());
                match self.policy {
                    StreamErrorPolicy::Abort => {
                        tracing::error!(%message, "Upstream error inside completion stream");
                        self.fail();
                        return Err(ChatError::UpstreamStream {
                            message,
                            partial: self.content.clone(),
                        });
                    }
                    StreamErrorPolicy::Continue => {
                        tracing::warn!(%message, "Ignoring upstream error inside completion stream");
                    }
                }
            }
            Record::Chunk(chunk) => {
                if let Some(delta) = chunk.delta_content().filter(|d| !d.is_empty()) {
                    self.content.push_str(delta);
                    self.emit(CompletionEvent::Delta(delta.to_string()));
                }
                if chunk.model.is_some() {
                    self.model = chunk.model;
                }
                if chunk.usage.is_some() {
                    self.usage = chunk.usage;
                }
                if chunk.timings.is_some() {
                    self.timings = chunk.timings;
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Finish the stream and produce the assembled assistant message
    ///
    /// A trailing line without a newline is processed first. Emits
    /// [`CompletionEvent::Finished`] and moves to `Done`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UpstreamStream`] if the trailing line is an
    /// embedded error under `Abort`, or [`ChatError::InvalidResponse`] if the
    /// accumulator already failed.
    pub fn finish(&mut self) -> Result<Message, ChatError> {
        self.begin();
        if self.state == StreamState::Errored {
            return Err(ChatError::InvalidResponse(
                "stream already ended with an error".to_string(),
            ));
        }
        if !self.terminated && !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.push_line(&line)?;
        }

        let message = Message::assistant(self.content.clone()).with_metadata(self.metadata());
        self.transition(StreamState::Done);
        self.emit(CompletionEvent::Finished(message.clone()));
        Ok(message)
    }

    /// Mark the stream as failed (transport error, timeout or cancellation)
    pub fn fail(&mut self) {
        if self.state != StreamState::Errored && self.state != StreamState::Done {
            self.transition(StreamState::Errored);
        }
    }

    fn transition(&mut self, next: StreamState) {
        tracing::trace!(from = %self.state, to = %next, "Stream state transition");
        self.state = next;
        self.emit(CompletionEvent::State(next));
    }

    fn emit(&self, event: CompletionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
