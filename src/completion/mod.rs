//! Chat completion client and streaming accumulator
//!
//! - `types`: messages, request/response wire shapes, metadata
//! - `record`: decoding of single event-stream lines into tagged records
//! - `accumulator`: the streaming state machine assembling the final message
//! - `client`: the HTTP client choosing between streaming and JSON branches

pub mod accumulator;
pub mod client;
pub mod record;
pub mod types;

pub use accumulator::{
    CompletionEvent, EventSender, Flow, StreamAccumulator, StreamErrorPolicy, StreamState,
};
pub use client::{accumulate_stream, ChatClient, CHAT_COMPLETIONS_PATH};
pub use record::{decode_line, Record};
pub use types::{
    extract_error_message, ApiErrorBody, ApiErrorDetail, ChatChunk, ChatCompletion, ChatRequest,
    ChunkChoice, ChunkDelta, CompletionChoice, CompletionMessage, Message, MessageMetadata,
    RequestMessage, Role, Timings, Usage,
};
