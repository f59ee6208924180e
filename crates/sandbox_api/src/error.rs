use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;
use serde_json::Value;

#[derive(Debug)]
pub enum SandboxApiError {
    InvalidBaseUrl(String),
    UrlNormalization(String),
    InvalidHeader(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Serde(JsonError),
    InvalidSession(String),
    WebSocket(String),
}

impl SandboxApiError {
    /// Status code when the sandbox answered with a non-success response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(status, _) => Some(*status),
            Self::Request(error) => error.status(),
            _ => None,
        }
    }
}

/// Error bodies seen from the sandbox backend: `{"detail": ..}` from the
/// framework, `{"error": ..}` / `{"message": ..}` from handlers.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorPayload {
    fn message(&self) -> Option<String> {
        self.detail
            .as_ref()
            .and_then(value_message)
            .or_else(|| self.error.as_ref().and_then(value_message))
            .or_else(|| self.message.as_deref().and_then(non_empty_string).map(str::to_owned))
    }
}

impl fmt::Display for SandboxApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl(value) => write!(f, "invalid base URL: {value}"),
            Self::UrlNormalization(message) => write!(f, "URL normalization failed: {message}"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::InvalidSession(message) => write!(f, "invalid session response: {message}"),
            Self::WebSocket(message) => write!(f, "websocket error: {message}"),
        }
    }
}

impl std::error::Error for SandboxApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(error) => Some(error),
            Self::Serde(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SandboxApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for SandboxApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SandboxApiError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(error.to_string())
    }
}

pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload.message() {
            return message;
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

fn value_message(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty_string(text).map(str::to_owned),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("msg"))
            .and_then(Value::as_str)
            .and_then(non_empty_string)
            .map(str::to_owned),
        // Validation errors arrive as a list of `{loc, msg}` objects.
        Value::Array(items) => {
            let messages: Vec<String> = items.iter().filter_map(value_message).collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
