//! Strongly typed error system for the hgql SDK.
//!
//! Every fallible operation returns [`SdkResult`], carrying an [`ErrorCode`]
//! that callers can match on instead of parsing messages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Typed error codes for compile-time safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Configuration errors
    MissingEndpoint,
    InvalidUrl,

    // Network errors
    NetworkError,
    Timeout,
    ConnectionRefused,

    // Protocol errors
    HttpError,
    InvalidRequest,
    InvalidResponse,

    // GraphQL errors
    ExecutionError,
    NoData,

    // Serialization errors
    SerializeError,
    DeserializeError,

    // Internal errors
    InternalError,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingEndpoint => "MISSING_ENDPOINT",
            Self::InvalidUrl => "INVALID_URL",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::HttpError => "HTTP_ERROR",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::ExecutionError => "EXECUTION_ERROR",
            Self::NoData => "NO_DATA",
            Self::SerializeError => "SERIALIZE_ERROR",
            Self::DeserializeError => "DESERIALIZE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this is a retryable error.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::ConnectionRefused
        )
    }

    /// Returns true if the error stems from process configuration.
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::MissingEndpoint | Self::InvalidUrl)
    }

    /// Returns true if this is a client error (4xx equivalent).
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingEndpoint
                | Self::InvalidUrl
                | Self::InvalidRequest
                | Self::SerializeError
        )
    }

    /// Returns true if this is a server error (5xx equivalent).
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::InternalError | Self::ExecutionError | Self::HttpError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strongly typed SDK error.
#[derive(Error, Debug, Clone)]
#[error("[{code}] {message}")]
pub struct SdkError {
    /// Typed error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Underlying cause, if any.
    #[source]
    pub source: Option<Box<SdkError>>,
    /// Extension data for debugging.
    pub extensions: Option<HashMap<String, serde_json::Value>>,
}

impl SdkError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            extensions: None,
        }
    }

    /// Adds a source error.
    pub fn with_source(mut self, source: SdkError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Adds extension data.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let extensions = self.extensions.get_or_insert_with(HashMap::new);
        if let Ok(v) = serde_json::to_value(value) {
            extensions.insert(key.into(), v);
        }
        self
    }

    /// Creates a missing-endpoint configuration error.
    pub fn missing_endpoint(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingEndpoint, message)
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidUrl,
            format!("Invalid GraphQL endpoint URL: {url}"),
        )
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    /// Creates a timeout error.
    pub fn timeout() -> Self {
        Self::new(ErrorCode::Timeout, "Request timed out")
    }

    /// Creates a serialization error.
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializeError, message)
    }

    /// Creates a deserialization error.
    pub fn deserialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeserializeError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns true if this error stems from process configuration.
    pub fn is_config_error(&self) -> bool {
        self.code.is_config_error()
    }

    /// Returns true if this is a client error.
    pub fn is_client_error(&self) -> bool {
        self.code.is_client_error()
    }

    /// Returns true if this is a server error.
    pub fn is_server_error(&self) -> bool {
        self.code.is_server_error()
    }
}

impl Serialize for SdkError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("SdkError", 3)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        if let Some(ref ext) = self.extensions {
            state.serialize_field("extensions", ext)?;
        }
        state.end()
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::Timeout
        } else if err.is_connect() {
            ErrorCode::ConnectionRefused
        } else if err.is_decode() {
            ErrorCode::InvalidResponse
        } else if err.is_status() {
            ErrorCode::HttpError
        } else if err.is_builder() {
            ErrorCode::InvalidRequest
        } else {
            ErrorCode::NetworkError
        };
        Self::new(code, err.to_string())
    }
}

/// Type alias for SDK results.
pub type SdkResult<T> = std::result::Result<T, SdkError>;

/// Result extension for mapping foreign errors with context.
pub trait ResultExt<T> {
    /// Maps the error to an SdkError with the given code.
    fn map_sdk_err(self, code: ErrorCode) -> SdkResult<T>;

    /// Maps the error to an SdkError with the given code and message.
    fn map_sdk_err_with(self, code: ErrorCode, message: impl Into<String>) -> SdkResult<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn map_sdk_err(self, code: ErrorCode) -> SdkResult<T> {
        self.map_err(|e| SdkError::new(code, e.to_string()))
    }

    fn map_sdk_err_with(self, code: ErrorCode, message: impl Into<String>) -> SdkResult<T> {
        self.map_err(|e| {
            SdkError::new(code, message).with_extension("original_error", e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_properties() {
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(ErrorCode::ConnectionRefused.is_retryable());
        assert!(!ErrorCode::MissingEndpoint.is_retryable());

        assert!(ErrorCode::MissingEndpoint.is_config_error());
        assert!(ErrorCode::InvalidUrl.is_client_error());
        assert!(!ErrorCode::ExecutionError.is_client_error());

        assert!(ErrorCode::ExecutionError.is_server_error());
        assert!(!ErrorCode::NoData.is_server_error());
    }

    #[test]
    fn test_error_display() {
        let err = SdkError::missing_endpoint("set GRAPHQL_ENDPOINT");
        assert_eq!(err.to_string(), "[MISSING_ENDPOINT] set GRAPHQL_ENDPOINT");
    }

    #[test]
    fn test_error_serialization() {
        let err = SdkError::network("Connection failed").with_extension("attempt", 2);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("NETWORK_ERROR"));
        assert!(json.contains("Connection failed"));
        assert!(json.contains("\"attempt\":2"));
    }

    #[test]
    fn test_error_source_chain() {
        let err = SdkError::new(ErrorCode::NoData, "empty page")
            .with_source(SdkError::deserialize("missing field `uri`"));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("DESERIALIZE_ERROR"));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<serde_json::Value, serde_json::Error> = serde_json::from_str("{");
        let sdk_result = result.map_sdk_err_with(ErrorCode::DeserializeError, "bad snapshot");
        let err = sdk_result.unwrap_err();
        assert_eq!(err.code, ErrorCode::DeserializeError);
        assert_eq!(err.message, "bad snapshot");
        assert!(err.extensions.unwrap().contains_key("original_error"));
    }
}
