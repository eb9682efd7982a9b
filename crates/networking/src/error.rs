//! # Network Errors
//!
//! Error types for the Cajal transport and protocol layers.

use thiserror::Error;

use crate::messages;

/// Network error types.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    // ========================================================================
    // Connection Errors
    // ========================================================================

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    // ========================================================================
    // Protocol Errors
    // ========================================================================

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),
}

impl NetworkError {
    /// True for errors that mean the peer is gone rather than misbehaving;
    /// these are logged, never sent back.
    pub fn is_disconnection(&self) -> bool {
        matches!(
            self,
            NetworkError::ConnectionClosed | NetworkError::SendFailed(_)
        )
    }

    /// Wire error code for transmission.
    pub fn code(&self) -> i32 {
        match self {
            NetworkError::ConnectionClosed => messages::INTERNAL_ERROR,
            NetworkError::SendFailed(_) => messages::INTERNAL_ERROR,
            NetworkError::SerializationError(_) => messages::INTERNAL_ERROR,
            NetworkError::ParseError(_) => messages::PARSE_ERROR,
            NetworkError::InvalidRequest(_) => messages::INVALID_REQUEST,
            NetworkError::MethodNotFound(_) => messages::METHOD_NOT_FOUND,
            NetworkError::InvalidParams(_) => messages::INVALID_PARAMS,
        }
    }
}

/// Result type for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;

// ============================================================================
// Entrypoint Errors
// ============================================================================

/// A structured request-handling error: the `{code, message, data}` triple
/// sent back to the client when the originating request expects a reply.
#[derive(Error, Debug, Clone)]
#[error("{message} (code {code})")]
pub struct EntrypointError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl EntrypointError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// A handler failure with no more specific classification.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(messages::INTERNAL_ERROR, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(messages::INVALID_PARAMS, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            messages::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }
}

impl From<NetworkError> for EntrypointError {
    fn from(e: NetworkError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<cajal_common::SceneError> for EntrypointError {
    fn from(e: cajal_common::SceneError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<cajal_common::PropertyError> for EntrypointError {
    fn from(e: cajal_common::PropertyError) -> Self {
        Self::invalid_params(e.to_string())
    }
}

/// Result type for request handlers.
pub type EntrypointResult<T> = Result<T, EntrypointError>;
