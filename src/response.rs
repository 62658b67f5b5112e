use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{meta::Meta, usage::Usage};

/// Parsed result of one completed text generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextResponse {
    pub text: String,
    pub finish_reason: String,
    pub usage: Usage,
    pub meta: Meta,
}

impl TextResponse {
    /// Extract a response from a wire body.
    ///
    /// Absent or null paths default (`""` for text fields, 0 for counters);
    /// the echoed `model` falls back to the request's resolved model. Only a
    /// body that is not JSON at all is an error, and that is rejected before
    /// this is called.
    pub(crate) fn from_wire(data: &Value, fallback_model: &str) -> Self {
        let usage = Usage {
            prompt_tokens: u32_at(data, "/usage/input_tokens"),
            completion_tokens: u32_at(data, "/usage/output_tokens"),
            cache_write_input_tokens: u32_at(data, "/usage/cache_creation_input_tokens"),
            cache_read_input_tokens: u32_at(data, "/usage/cache_read_input_tokens"),
        };

        let meta = Meta {
            id: str_at(data, "/id").to_string(),
            model: data
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(fallback_model)
                .to_string(),
        };

        Self {
            text: str_at(data, "/content/0/text").to_string(),
            finish_reason: str_at(data, "/stop_reason").to_string(),
            usage,
            meta,
        }
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self
        }
    }

    pub fn with_finish_reason(self, finish_reason: impl Into<String>) -> Self {
        Self {
            finish_reason: finish_reason.into(),
            ..self
        }
    }

    pub fn with_usage(self, usage: Usage) -> Self {
        Self { usage, ..self }
    }

    pub fn with_meta(self, meta: Meta) -> Self {
        Self { meta, ..self }
    }
}

fn str_at<'a>(data: &'a Value, pointer: &str) -> &'a str {
    data.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn u32_at(data: &Value, pointer: &str) -> u32 {
    data.pointer(pointer)
        .and_then(Value::as_u64)
        .map_or(0, |count| u32::try_from(count).unwrap_or(u32::MAX))
}
