use async_stream::try_stream;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    client::Bedrock,
    error::{self, BedrockRequestError},
    eventstream::EventStreamParser,
    message::{Message, SystemMessage, UserMessage},
    response::TextResponse,
    testing::RecordedRequest,
};

/// Chainable builder for one text-generation call.
///
/// Setters never validate; everything resolves at send time against the
/// owning client's defaults. Terminal methods borrow, so a builder can be
/// reused for a follow-up call; its state persists until dropped.
#[derive(Debug, Clone)]
pub struct TextRequest {
    client: Bedrock,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    system_prompts: Vec<SystemMessage>,
    messages: Vec<Message>,
    prompt: Option<UserMessage>,
}

impl TextRequest {
    pub(crate) fn new(client: Bedrock) -> Self {
        Self {
            client,
            model: None,
            max_tokens: None,
            temperature: None,
            system_prompts: Vec::new(),
            messages: Vec::new(),
            prompt: None,
        }
    }

    /// Select the target model. The provider argument is accepted for
    /// call-site compatibility with multi-provider conventions and ignored.
    pub fn using(mut self, _provider: &str, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Append one system prompt.
    pub fn with_system_prompt(mut self, message: impl Into<SystemMessage>) -> Self {
        self.system_prompts.push(message.into());
        self
    }

    /// Replace the entire system-prompt sequence.
    pub fn with_system_prompts<I, M>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<SystemMessage>,
    {
        self.system_prompts = messages.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the prior-message sequence.
    pub fn with_messages<I, M>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Message>,
    {
        self.messages = messages.into_iter().map(Into::into).collect();
        self
    }

    /// Set the final user turn, overwriting any previous value.
    pub fn with_prompt(mut self, prompt: impl Into<UserMessage>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn using_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Send the request and wait for the complete response.
    pub async fn as_text(&self) -> Result<TextResponse, BedrockRequestError> {
        if let Some(fake) = self.client.fake_handle() {
            fake.record(self.snapshot());
            return fake.next_response();
        }

        let model = self.resolved_model().to_string();
        let url = self.client.invoke_url(&model, false);
        let body = self.wire_body();
        debug!(%model, "invoking model");

        let res = self
            .client
            .http()
            .post(&url)
            .bearer_auth(self.client.api_key())
            .header("accept", "application/json")
            .timeout(self.client.timeout())
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(error::parse_error_response(status, bytes));
        }

        let data: Value = serde_json::from_slice(&bytes)?;
        Ok(TextResponse::from_wire(&data, &model))
    }

    /// Send the request against the streaming endpoint.
    ///
    /// The returned stream is finite and single-pass; each decoded event is
    /// one provider event object. Iteration drives the reads; dropping the
    /// stream abandons the transfer.
    pub fn as_stream(&self) -> BoxStream<'static, Result<Value, BedrockRequestError>> {
        if let Some(fake) = self.client.fake_handle() {
            fake.record(self.snapshot());
            return match fake.next_stream_response() {
                Ok(events) => stream::iter(events.into_iter().map(Ok)).boxed(),
                Err(err) => stream::once(async move { Err(err) }).boxed(),
            };
        }

        let client = self.client.clone();
        let model = self.resolved_model().to_string();
        let url = client.invoke_url(&model, true);
        let body = self.wire_body();

        Box::pin(try_stream! {
            debug!(model = %model, "invoking model with response stream");
            let response = client
                .http()
                .post(&url)
                .bearer_auth(client.api_key())
                .header("accept", "application/json")
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let bytes = response.bytes().await?;
                Err(error::parse_error_response(status, bytes))?;
            } else {
                let mut parser = EventStreamParser::new(response);
                while let Some(event) = parser.next_event().await? {
                    yield event;
                }
            }
        })
    }

    fn resolved_model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.client.default_model())
    }

    fn resolved_max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(self.client.default_max_tokens())
    }

    /// The JSON body for either endpoint. `system` appears only when at
    /// least one system prompt is set (never as an empty array), and
    /// `temperature` only when explicitly configured.
    fn wire_body(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            "anthropic_version".to_string(),
            Value::from(self.client.anthropic_version()),
        );
        body.insert("max_tokens".to_string(), Value::from(self.resolved_max_tokens()));
        body.insert("messages".to_string(), Value::Array(self.wire_messages()));

        if !self.system_prompts.is_empty() {
            body.insert(
                "system".to_string(),
                Value::Array(
                    self.system_prompts
                        .iter()
                        .map(SystemMessage::to_value)
                        .collect(),
                ),
            );
        }

        if let Some(temperature) = self.temperature {
            body.insert("temperature".to_string(), Value::from(temperature));
        }

        Value::Object(body)
    }

    /// Prior messages in order, then the prompt as the final user turn.
    fn wire_messages(&self) -> Vec<Value> {
        let mut messages: Vec<Value> = self.messages.iter().map(Message::to_value).collect();

        if let Some(prompt) = &self.prompt {
            messages.push(prompt.to_value());
        }

        messages
    }

    fn snapshot(&self) -> RecordedRequest {
        RecordedRequest {
            model: self.resolved_model().to_string(),
            system_prompts: self.system_prompts.clone(),
            messages: self.messages.clone(),
            prompt: self.prompt.clone(),
            max_tokens: self.resolved_max_tokens(),
            temperature: self.temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AssistantMessage, SystemMessage};

    fn request() -> TextRequest {
        Bedrock::new("test-api-key").text()
    }

    #[test]
    fn body_always_carries_version_max_tokens_and_messages() {
        let body = request().with_prompt("Hello!").wire_body();

        assert_eq!(body["anthropic_version"], "bedrock-2023-05-31");
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["text"], "Hello!");
    }

    #[test]
    fn system_preserves_length_and_order() {
        let body = request()
            .with_system_prompts(["You are a helpful assistant.", "Always respond in Japanese."])
            .with_prompt("Hello!")
            .wire_body();

        let system = body["system"].as_array().unwrap();
        assert_eq!(system.len(), 2);
        assert_eq!(system[0]["text"], "You are a helpful assistant.");
        assert_eq!(system[0]["cache_control"]["type"], "ephemeral");
        assert_eq!(system[1]["text"], "Always respond in Japanese.");
    }

    #[test]
    fn empty_system_sequence_omits_the_key_entirely() {
        let body = request().with_prompt("Hello!").wire_body();
        assert!(body.get("system").is_none());
    }

    #[test]
    fn with_system_prompts_replaces_earlier_appends() {
        let body = request()
            .with_system_prompt("dropped")
            .with_system_prompts(["kept"])
            .wire_body();

        let system = body["system"].as_array().unwrap();
        assert_eq!(system.len(), 1);
        assert_eq!(system[0]["text"], "kept");
    }

    #[test]
    fn temperature_appears_only_when_set_and_exactly() {
        let without = request().with_prompt("x").wire_body();
        assert!(without.get("temperature").is_none());

        let with = request().with_prompt("x").using_temperature(0.7).wire_body();
        assert_eq!(with["temperature"], 0.7);
    }

    #[test]
    fn prompt_serializes_last_after_prior_messages() {
        let body = request()
            .with_messages([
                Message::from(UserMessage::new("earlier question")),
                Message::from(AssistantMessage::new("earlier answer")),
            ])
            .with_prompt("follow-up")
            .wire_body();

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["text"], "follow-up");
    }

    #[test]
    fn with_prompt_overwrites_the_previous_value() {
        let body = request().with_prompt("first").with_prompt("second").wire_body();

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["content"][0]["text"], "second");
    }

    #[test]
    fn system_message_in_history_serializes_as_user_role() {
        let body = request()
            .with_messages([Message::from(SystemMessage::new("X"))])
            .wire_body();

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"][0]["text"], "X");
    }

    #[test]
    fn explicit_overrides_replace_client_defaults() {
        let req = request()
            .using("bedrock", "anthropic.claude-3-haiku-20240307-v1:0")
            .with_max_tokens(512);
        let body = req.wire_body();

        assert_eq!(req.resolved_model(), "anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(body["max_tokens"], 512);
    }
}
