use futures_util::stream::{BoxStream, StreamExt};
use serde_json::Value;

use crate::{
    client::Bedrock,
    error::BedrockRequestError,
    message::Message,
    response::TextResponse,
};

/// Stream events surfaced to a host AI SDK. Only the text-bearing provider
/// events map to a variant; everything else is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextStreamEvent {
    StreamStart { model: String },
    TextStart,
    TextDelta { text: String },
    TextEnd,
}

/// Adapter between a host AI SDK's text-generation surface and the Bedrock
/// client. Capabilities the runtime does not offer fail immediately.
#[derive(Debug, Clone)]
pub struct BedrockGateway {
    client: Bedrock,
}

impl BedrockGateway {
    pub fn new(client: Bedrock) -> Self {
        Self { client }
    }

    /// Generate the next message of a conversation.
    pub async fn generate_text(
        &self,
        model: Option<&str>,
        instructions: Option<&str>,
        messages: Vec<Message>,
    ) -> Result<TextResponse, BedrockRequestError> {
        self.text_request(model, instructions, messages)
            .as_text()
            .await
    }

    /// Stream the next message of a conversation as text events.
    pub fn stream_text(
        &self,
        model: Option<&str>,
        instructions: Option<&str>,
        messages: Vec<Message>,
    ) -> BoxStream<'static, Result<TextStreamEvent, BedrockRequestError>> {
        let model_name = model.unwrap_or(self.client.default_model()).to_string();
        let events = self
            .text_request(model, instructions, messages)
            .as_stream();

        events
            .filter_map(move |event| {
                let mapped = match event {
                    Ok(event) => to_text_stream_event(&event, &model_name).map(Ok),
                    Err(err) => Some(Err(err)),
                };
                async move { mapped }
            })
            .boxed()
    }

    /// Generate audio from text. Not offered by this runtime.
    pub fn generate_audio(
        &self,
        _model: &str,
        _text: &str,
        _voice: &str,
    ) -> Result<(), BedrockRequestError> {
        Err(BedrockRequestError::Unsupported("audio generation"))
    }

    /// Generate embedding vectors. Not offered by this runtime.
    pub fn generate_embeddings(
        &self,
        _model: &str,
        _inputs: &[String],
    ) -> Result<(), BedrockRequestError> {
        Err(BedrockRequestError::Unsupported("embeddings generation"))
    }

    /// Generate an image. Not offered by this runtime.
    pub fn generate_image(
        &self,
        _model: &str,
        _prompt: &str,
    ) -> Result<(), BedrockRequestError> {
        Err(BedrockRequestError::Unsupported("image generation"))
    }

    /// Transcribe audio. Not offered by this runtime.
    pub fn generate_transcription(
        &self,
        _model: &str,
        _audio: &[u8],
    ) -> Result<(), BedrockRequestError> {
        Err(BedrockRequestError::Unsupported("transcription generation"))
    }

    fn text_request(
        &self,
        model: Option<&str>,
        instructions: Option<&str>,
        messages: Vec<Message>,
    ) -> crate::request::TextRequest {
        let mut request = self.client.text();
        if let Some(model) = model {
            request = request.using("bedrock", model);
        }
        if let Some(instructions) = instructions {
            request = request.with_system_prompt(instructions);
        }
        if !messages.is_empty() {
            request = request.with_messages(messages);
        }
        request
    }
}

fn to_text_stream_event(event: &Value, model: &str) -> Option<TextStreamEvent> {
    match event.get("type").and_then(Value::as_str) {
        Some("message_start") => Some(TextStreamEvent::StreamStart {
            model: model.to_string(),
        }),
        Some("content_block_start") => Some(TextStreamEvent::TextStart),
        Some("content_block_delta") => Some(TextStreamEvent::TextDelta {
            text: event
                .pointer("/delta/text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        Some("content_block_stop") => Some(TextStreamEvent::TextEnd),
        _ => None,
    }
}
