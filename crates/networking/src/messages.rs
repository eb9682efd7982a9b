//! # Protocol Messages
//!
//! The JSON-RPC shaped wire protocol spoken over WebSocket text frames.
//!
//! ## Message shapes
//!
//! - **Request**: `{jsonrpc, id, method, params}`; `id` is absent or null
//!   for fire-and-forget notifications from the client.
//! - **Reply**: `{jsonrpc, id, method, result}`, echoing the request's id
//!   and method.
//! - **Error**: `{jsonrpc, id, method, error: {code, message, data}}`.
//! - **Update**: `{jsonrpc, method, params}`, a spontaneous server-to-client
//!   notification; never carries an id.
//! - **Progress**: an update with method `"progress"` whose params carry the
//!   originating request id, a description and a 0..1 fraction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EntrypointError, NetworkError, NetworkResult};
use crate::socket::Packet;

// ============================================================================
// Protocol Constants
// ============================================================================

/// Protocol version carried by every message.
pub const JSON_RPC_VERSION: &str = "2.0";

/// Method name of progress updates.
pub const PROGRESS_METHOD: &str = "progress";

/// The request was not valid JSON.
pub const PARSE_ERROR: i32 = -32700;

/// The request was valid JSON but not a valid request object.
pub const INVALID_REQUEST: i32 = -32600;

/// No entrypoint is registered under the requested method.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// The params did not match the entrypoint's schema.
pub const INVALID_PARAMS: i32 = -32602;

/// A handler failure with no more specific protocol code.
pub const INTERNAL_ERROR: i32 = 0;

// ============================================================================
// Requests
// ============================================================================

/// A decoded client request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMessage {
    /// Protocol version; must equal [`JSON_RPC_VERSION`].
    #[serde(default)]
    pub jsonrpc: String,
    /// Correlation id; null or an empty string means "do not reply".
    #[serde(default)]
    pub id: Value,
    /// Entrypoint name.
    pub method: String,
    /// Entrypoint parameters; null when absent.
    #[serde(default)]
    pub params: Value,
}

impl RequestMessage {
    /// Decode and validate one text frame.
    ///
    /// Distinguishes malformed JSON ([`NetworkError::ParseError`]) from a
    /// well-formed value that is not a request object
    /// ([`NetworkError::InvalidRequest`]).
    pub fn parse(text: &str) -> NetworkResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| NetworkError::ParseError(e.to_string()))?;
        let message: RequestMessage =
            serde_json::from_value(value).map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;
        if message.jsonrpc != JSON_RPC_VERSION {
            return Err(NetworkError::InvalidRequest(format!(
                "unsupported protocol version '{}'",
                message.jsonrpc
            )));
        }
        if message.method.is_empty() {
            return Err(NetworkError::InvalidRequest("method is empty".to_string()));
        }
        Ok(message)
    }

    /// True iff the client expects a reply frame for this request.
    pub fn should_be_replied(&self) -> bool {
        !(self.id.is_null() || self.id.as_str() == Some(""))
    }
}

// ============================================================================
// Replies
// ============================================================================

/// A successful reply to one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub jsonrpc: String,
    /// Echo of the request id.
    pub id: Value,
    /// Echo of the request method.
    pub method: String,
    pub result: Value,
}

/// The `{code, message, data}` triple inside an error reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&EntrypointError> for ErrorInfo {
    fn from(e: &EntrypointError) -> Self {
        Self {
            code: e.code,
            message: e.message.clone(),
            data: e.data.clone(),
        }
    }
}

/// An error reply to one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub jsonrpc: String,
    /// Echo of the request id; null when the request was undecodable.
    pub id: Value,
    /// Echo of the request method; empty when the request was undecodable.
    pub method: String,
    pub error: ErrorInfo,
}

// ============================================================================
// Notifications
// ============================================================================

/// A spontaneous server-to-client update; carries no id and gets no reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

/// Parameters of a progress update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressParams {
    /// Id of the request the work belongs to.
    pub id: Value,
    /// Human-readable description of the current step.
    pub operation: String,
    /// Completed fraction in `[0, 1]`.
    pub amount: f64,
}

// ============================================================================
// Factory
// ============================================================================

/// Builders for outbound messages that echo request identity correctly.
pub struct MessageFactory;

impl MessageFactory {
    pub fn reply(request: &RequestMessage, result: Value) -> ReplyMessage {
        ReplyMessage {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id: request.id.clone(),
            method: request.method.clone(),
            result,
        }
    }

    pub fn error(request: &RequestMessage, error: &EntrypointError) -> ErrorMessage {
        ErrorMessage {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id: request.id.clone(),
            method: request.method.clone(),
            error: ErrorInfo::from(error),
        }
    }

    /// An error reply for a request that could not be decoded at all.
    pub fn invalid_request(error: &NetworkError) -> ErrorMessage {
        ErrorMessage {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id: Value::Null,
            method: String::new(),
            error: ErrorInfo {
                code: error.code(),
                message: error.to_string(),
                data: None,
            },
        }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> NotificationMessage {
        NotificationMessage {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }

    /// A progress update bound to `request`'s id.
    pub fn progress(request: &RequestMessage, operation: &str, amount: f64) -> NotificationMessage {
        let params = ProgressParams {
            id: request.id.clone(),
            operation: operation.to_string(),
            amount,
        };
        Self::notification(
            PROGRESS_METHOD,
            serde_json::to_value(params).unwrap_or(Value::Null),
        )
    }
}

/// Encode any message as a text frame.
pub fn to_packet<T: Serialize>(message: &T) -> NetworkResult<Packet> {
    let text = serde_json::to_string(message)
        .map_err(|e| NetworkError::SerializationError(e.to_string()))?;
    Ok(Packet::Text(text))
}

// ============================================================================
// Tests
// ============================================================================
