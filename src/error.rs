use serde::Deserialize;
use thiserror::Error;

/// Structured error body in the Anthropic format, echoed by some Bedrock
/// error responses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(default)]
    pub r#type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Bedrock's own error format: a bare top-level `message`.
#[derive(Debug, Deserialize)]
struct RuntimeErrorBody {
    message: String,
}

#[derive(Debug, Error)]
pub enum BedrockRequestError {
    /// Errors from the HTTP client
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),

    /// Invalid request errors from the API
    #[error("Invalid request error: {0}")]
    InvalidRequest(String),

    /// Authentication error
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// API overloaded or temporarily unavailable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Unexpected response from the API
    #[error("Unexpected response from API: {0}")]
    UnexpectedResponse(String),

    /// Invalid event data in stream
    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    /// The test double's canned queue ran out
    #[error("Could not find a {0} for the request")]
    MissingFakeResponse(&'static str),

    /// Capability this provider does not implement
    #[error("Not supported: {0}")]
    Unsupported(&'static str),
}

/// Parse an error response body from the Bedrock runtime.
///
/// Handles the Anthropic `{"error": {...}}` shape, Bedrock's bare
/// `{"message": "..."}` shape, and plain-text bodies, falling back on the
/// HTTP status for classification.
pub fn parse_error_response(
    status: reqwest::StatusCode,
    bytes: bytes::Bytes,
) -> BedrockRequestError {
    if let Ok(payload) = serde_json::from_slice::<ApiErrorResponse>(&bytes) {
        return match payload.error.r#type.as_deref() {
            Some("invalid_request_error") => {
                BedrockRequestError::InvalidRequest(payload.error.message)
            }
            Some("authentication_error") => {
                BedrockRequestError::Authentication(payload.error.message)
            }
            Some("permission_error") => {
                BedrockRequestError::PermissionDenied(payload.error.message)
            }
            Some("not_found_error") => BedrockRequestError::NotFound(payload.error.message),
            Some("rate_limit_error") => BedrockRequestError::RateLimit,
            Some("overloaded_error") => {
                BedrockRequestError::ServiceUnavailable(payload.error.message)
            }
            _ => BedrockRequestError::UnexpectedResponse(payload.error.message),
        };
    }

    let message = serde_json::from_slice::<RuntimeErrorBody>(&bytes)
        .map(|body| body.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).to_string());

    match status.as_u16() {
        400 => BedrockRequestError::InvalidRequest(message),
        401 => BedrockRequestError::Authentication(message),
        403 => BedrockRequestError::PermissionDenied(message),
        404 => BedrockRequestError::NotFound(message),
        429 => BedrockRequestError::RateLimit,
        500 | 503 => BedrockRequestError::ServiceUnavailable(message),
        _ => BedrockRequestError::UnexpectedResponse(format!(
            "HTTP status {}: {}",
            status.as_u16(),
            message
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> reqwest::StatusCode {
        reqwest::StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn anthropic_error_shape_is_classified_by_type() {
        let body = bytes::Bytes::from_static(
            br#"{"error":{"type":"invalid_request_error","message":"max_tokens is required"}}"#,
        );
        let err = parse_error_response(status(400), body);
        assert!(matches!(err, BedrockRequestError::InvalidRequest(m) if m == "max_tokens is required"));
    }

    #[test]
    fn bedrock_message_shape_is_classified_by_status() {
        let body = bytes::Bytes::from_static(br#"{"message":"The security token is invalid"}"#);
        let err = parse_error_response(status(403), body);
        assert!(matches!(err, BedrockRequestError::PermissionDenied(m) if m == "The security token is invalid"));
    }

    #[test]
    fn throttling_maps_to_rate_limit() {
        let body = bytes::Bytes::from_static(br#"{"message":"Too many requests"}"#);
        let err = parse_error_response(status(429), body);
        assert!(matches!(err, BedrockRequestError::RateLimit));
    }

    #[test]
    fn plain_text_body_falls_back_to_status() {
        let body = bytes::Bytes::from_static(b"upstream connect error");
        let err = parse_error_response(status(502), body);
        assert!(matches!(err, BedrockRequestError::UnexpectedResponse(m) if m.contains("502")));
    }
}
