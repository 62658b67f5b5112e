use bon::Builder;
use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    request::TextRequest,
    response::TextResponse,
    testing::{BedrockFake, StreamResponseFake},
};

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const DEFAULT_MODEL: &str = "global.anthropic.claude-sonnet-4-5-20250929-v1:0";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for the Amazon Bedrock runtime, speaking the Anthropic Messages
/// schema over the `invoke` / `invoke-with-response-stream` operations.
///
/// Holds the configuration surface (bearer key, region, protocol version,
/// default model and token cap, timeout) and hands out [`TextRequest`]s.
/// A client carrying a [`BedrockFake`] records requests and replays canned
/// responses instead of performing I/O.
#[derive(Clone, Builder)]
pub struct Bedrock {
    #[builder(into)]
    pub(crate) api_key: String,
    #[builder(default = DEFAULT_REGION.to_string(), into)]
    pub(crate) region: String,
    #[builder(default = DEFAULT_ANTHROPIC_VERSION.to_string(), into)]
    pub(crate) anthropic_version: String,
    #[builder(default = DEFAULT_MODEL.to_string(), into)]
    pub(crate) model: String,
    #[builder(default = DEFAULT_MAX_TOKENS)]
    pub(crate) max_tokens: u32,
    #[builder(default = Duration::from_secs(DEFAULT_TIMEOUT_SECS))]
    pub(crate) timeout: Duration,
    #[builder(default)]
    pub(crate) client: reqwest::Client,
    /// Overrides the `https://bedrock-runtime.<region>.amazonaws.com` host,
    /// for stub servers in tests.
    #[builder(into)]
    pub(crate) base_url: Option<String>,
    pub(crate) fake: Option<Arc<BedrockFake>>,
}

impl Bedrock {
    /// Create a client with the given bearer API key and default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            region: DEFAULT_REGION.to_string(),
            anthropic_version: DEFAULT_ANTHROPIC_VERSION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            client: reqwest::Client::new(),
            base_url: None,
            fake: None,
        }
    }

    /// Build a client from the `AWS_BEDROCK_*` environment, failing only
    /// when the API key is missing.
    pub fn load_from_env() -> Result<Self, std::env::VarError> {
        let api_key = std::env::var("AWS_BEDROCK_API_KEY")?;
        Ok(Self {
            api_key,
            region: env_or("AWS_DEFAULT_REGION", DEFAULT_REGION),
            anthropic_version: env_or("AWS_BEDROCK_ANTHROPIC_VERSION", DEFAULT_ANTHROPIC_VERSION),
            model: env_or("AWS_BEDROCK_MODEL", DEFAULT_MODEL),
            max_tokens: env_parse("AWS_BEDROCK_MAX_TOKENS", DEFAULT_MAX_TOKENS),
            timeout: Duration::from_secs(env_parse("AWS_BEDROCK_TIMEOUT", DEFAULT_TIMEOUT_SECS)),
            client: reqwest::Client::new(),
            base_url: None,
            fake: None,
        })
    }

    /// Replace this client's transport with a recording fake. The returned
    /// handle holds the configured canned responses and the recorded log.
    pub fn fake(
        responses: impl IntoIterator<Item = TextResponse>,
        stream_responses: impl IntoIterator<Item = StreamResponseFake>,
    ) -> (Self, Arc<BedrockFake>) {
        let fake = Arc::new(BedrockFake::new(responses, stream_responses));
        let client = Self::new("fake-api-key").with_fake(Arc::clone(&fake));
        (client, fake)
    }

    /// Attach an existing fake, keeping this client's configuration.
    pub fn with_fake(mut self, fake: Arc<BedrockFake>) -> Self {
        self.fake = Some(fake);
        self
    }

    /// Start building a text-generation request.
    pub fn text(&self) -> TextRequest {
        TextRequest::new(self.clone())
    }

    pub(crate) fn invoke_url(&self, model: &str, streaming: bool) -> String {
        let host = match &self.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        };
        let operation = if streaming {
            "invoke-with-response-stream"
        } else {
            "invoke"
        };
        format!("{host}/model/{model}/{operation}")
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn anthropic_version(&self) -> &str {
        &self.anthropic_version
    }

    pub(crate) fn default_model(&self) -> &str {
        &self.model
    }

    pub(crate) fn default_max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn fake_handle(&self) -> Option<&BedrockFake> {
        self.fake.as_deref()
    }
}

impl fmt::Debug for Bedrock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bedrock")
            .field("api_key", &"[REDACTED]")
            .field("region", &self.region)
            .field("anthropic_version", &self.anthropic_version)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("faked", &self.fake.is_some())
            .finish_non_exhaustive()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
