//! In-memory test double for the Bedrock client.
//!
//! [`BedrockFake`] records every terminal call's resolved request state and
//! replays canned responses instead of performing network I/O. Callers write
//! the same code against a faked client as against a real one.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Value, json};

use crate::{
    error::BedrockRequestError,
    message::{Message, SystemMessage, UserMessage},
    meta::Meta,
    response::TextResponse,
    usage::Usage,
};

/// Snapshot of a request's resolved state at the moment a terminal method
/// ran: model and max tokens already fall back to the client defaults.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub system_prompts: Vec<SystemMessage>,
    pub messages: Vec<Message>,
    pub prompt: Option<UserMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

#[derive(Debug, Default)]
struct FakeState {
    recorded: Vec<RecordedRequest>,
    response_sequence: usize,
    stream_response_sequence: usize,
}

/// Records requests and replays configured responses in order.
///
/// With no canned responses configured, every call gets the default
/// empty-text `end_turn` response (or the default empty stream sequence),
/// reused without bound. Once responses are configured, they are consumed
/// strictly in order and exhaustion is an error, never a recycle.
///
/// State lives behind a `Mutex` only so the fake can be shared through an
/// `Arc`; the contract is single-threaded test execution.
#[derive(Debug, Default)]
pub struct BedrockFake {
    responses: Vec<TextResponse>,
    stream_responses: Vec<StreamResponseFake>,
    state: Mutex<FakeState>,
}

impl BedrockFake {
    pub fn new(
        responses: impl IntoIterator<Item = TextResponse>,
        stream_responses: impl IntoIterator<Item = StreamResponseFake>,
    ) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            stream_responses: stream_responses.into_iter().collect(),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// A poisoned lock means an earlier assertion panicked; the state itself
    /// is still usable, so recover it instead of cascading panics.
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record(&self, request: RecordedRequest) {
        self.state().recorded.push(request);
    }

    pub(crate) fn next_response(&self) -> Result<TextResponse, BedrockRequestError> {
        if self.responses.is_empty() {
            return Ok(TextResponseFake::make());
        }

        let mut state = self.state();
        let Some(response) = self.responses.get(state.response_sequence) else {
            return Err(BedrockRequestError::MissingFakeResponse("response"));
        };
        state.response_sequence += 1;
        Ok(response.clone())
    }

    pub(crate) fn next_stream_response(&self) -> Result<Vec<Value>, BedrockRequestError> {
        if self.stream_responses.is_empty() {
            return Ok(StreamResponseFake::make("").to_events());
        }

        let mut state = self.state();
        let Some(stream) = self.stream_responses.get(state.stream_response_sequence) else {
            return Err(BedrockRequestError::MissingFakeResponse("stream response"));
        };
        state.stream_response_sequence += 1;
        Ok(stream.to_events())
    }

    /// All requests recorded so far, in call order.
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.state().recorded.clone()
    }

    /// Hands the full recorded log to the given inspector.
    pub fn assert_request<F>(&self, inspect: F)
    where
        F: FnOnce(&[RecordedRequest]),
    {
        inspect(&self.recorded());
    }

    /// Panics unless some recorded request carried exactly this prompt.
    pub fn assert_prompt(&self, prompt: &str) {
        let recorded = self.recorded();
        let found = recorded
            .iter()
            .any(|request| request.prompt.as_ref().is_some_and(|p| p.content == prompt));

        assert!(
            found,
            "Could not find the prompt '{prompt}' in the recorded requests; recorded prompts: {:?}",
            recorded
                .iter()
                .filter_map(|request| request.prompt.as_ref().map(|p| p.content.as_str()))
                .collect::<Vec<_>>()
        );
    }

    /// Panics unless some recorded request's system prompts contain this text.
    pub fn assert_system_prompt(&self, system_prompt: &str) {
        let recorded = self.recorded();
        let found = recorded
            .iter()
            .flat_map(|request| request.system_prompts.iter())
            .any(|message| message.content == system_prompt);

        assert!(
            found,
            "Could not find the system prompt '{system_prompt}' in the recorded requests; recorded system prompts: {:?}",
            recorded
                .iter()
                .flat_map(|request| request.system_prompts.iter().map(|m| m.content.as_str()))
                .collect::<Vec<_>>()
        );
    }

    /// Panics unless exactly this many terminal calls were recorded.
    pub fn assert_call_count(&self, expected: usize) {
        let actual = self.recorded().len();
        assert!(expected == actual, "Expected {expected} calls, got {actual}");
    }
}

/// Factory for canned text responses. Combine with the `with_*` copies on
/// [`TextResponse`] to shape one:
///
/// ```
/// use bedrock_ox::testing::TextResponseFake;
///
/// let canned = TextResponseFake::make().with_text("Hello!");
/// ```
pub struct TextResponseFake;

impl TextResponseFake {
    /// Empty-text `end_turn` response with zeroed usage and fake identifiers.
    pub fn make() -> TextResponse {
        TextResponse {
            text: String::new(),
            finish_reason: "end_turn".to_string(),
            usage: Usage::new(0, 0),
            meta: Meta::new("fake-id", "fake-model"),
        }
    }
}

/// Builds the canonical event sequence of a streaming call: `message_start`,
/// `content_block_start`, one `content_block_delta` per chunk,
/// `content_block_stop`, `message_delta`, `message_stop`.
#[derive(Debug, Clone, Default)]
pub struct StreamResponseFake {
    text: String,
    chunks: Vec<String>,
}

impl StreamResponseFake {
    pub fn make(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chunks: Vec::new(),
        }
    }

    /// Replaces the single whole-text delta with one delta per chunk.
    pub fn with_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    pub fn to_events(&self) -> Vec<Value> {
        let mut events = vec![
            json!({
                "type": "message_start",
                "message": {
                    "id": "fake-id",
                    "type": "message",
                    "role": "assistant",
                    "model": "fake-model",
                    "content": [],
                    "stop_reason": null,
                    "usage": { "input_tokens": 0, "output_tokens": 0 }
                }
            }),
            json!({
                "type": "content_block_start",
                "index": 0,
                "content_block": { "type": "text", "text": "" }
            }),
        ];

        let whole_text = [self.text.clone()];
        let chunks: &[String] = if self.chunks.is_empty() {
            &whole_text
        } else {
            &self.chunks
        };
        for chunk in chunks {
            events.push(json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": { "type": "text_delta", "text": chunk }
            }));
        }

        events.push(json!({ "type": "content_block_stop", "index": 0 }));
        events.push(json!({
            "type": "message_delta",
            "delta": { "stop_reason": "end_turn" },
            "usage": { "output_tokens": 0 }
        }));
        events.push(json!({ "type": "message_stop" }));

        events
    }
}
