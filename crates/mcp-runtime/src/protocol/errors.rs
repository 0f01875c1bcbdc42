//! Protocol Error Types
//!
//! Unified error hierarchy for the JSON-RPC envelope, the protocol engine,
//! and the MCP payload layer. Every error kind that can travel on the wire
//! knows its JSON-RPC error code; purely local policy violations
//! (cancellation, capability gating) never become error responses.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// Layer 3: Internal module imports
use crate::protocol::constants::error_codes;

/// Wire-shaped JSON-RPC error object (`{code, message, data?}`)
///
/// This is the payload of an error response envelope. It is deliberately
/// dumb: semantic classification lives in [`McpError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// JSON-RPC error code
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Optional structured error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Create a new error object
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured details
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Errors produced by the protocol engine and payload layer
///
/// The kinds mirror the JSON-RPC error taxonomy plus the local-only
/// conditions an MCP runtime needs: cancellation, capability gating, and
/// connection loss.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum McpError {
    /// Bad JSON or a malformed envelope (-32700)
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Envelope shape violation (-32600)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// No handler and no fallback for an inbound method (-32601)
    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    /// Typed parameter decode failure (-32602)
    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    /// Handler raised an unexpected error (-32603)
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Transport ended while the request was outstanding (-32000)
    #[error("Connection closed")]
    ConnectionClosed,

    /// Per-request timer fired (-32001)
    #[error("Request timed out after {timeout_ms}ms")]
    RequestTimeout { timeout_ms: u64 },

    /// Caller-driven cancellation; never sent to the peer as an error
    #[error("Request aborted: {reason}")]
    Aborted { reason: String },

    /// Local capability gate rejected the operation before the wire
    #[error("Capability not supported: {message}")]
    CapabilityUnsupported { message: String },

    /// Server replied to initialize with a version this runtime cannot speak
    #[error("Unsupported protocol version: {version}")]
    UnsupportedProtocolVersion { version: String },

    /// Error response from the peer that maps to no local kind
    #[error("Peer error {code}: {message}")]
    Peer {
        code: i32,
        message: String,
        data: Option<Value>,
    },

    /// Transport-level failure surfaced through the engine
    #[error("Transport error: {message}")]
    Transport { message: String },
}

/// Convenient result type for protocol operations
pub type McpResult<T> = Result<T, McpError>;

impl McpError {
    /// JSON-RPC error code for kinds that can travel on the wire
    ///
    /// Local-only kinds (`Aborted`, `CapabilityUnsupported`,
    /// `UnsupportedProtocolVersion`, `Transport`) fall back to the internal
    /// error code; the engine never serializes them into responses.
    pub fn error_code(&self) -> i32 {
        match self {
            McpError::Parse { .. } => error_codes::PARSE_ERROR,
            McpError::InvalidRequest { .. } => error_codes::INVALID_REQUEST,
            McpError::MethodNotFound { .. } => error_codes::METHOD_NOT_FOUND,
            McpError::InvalidParams { .. } => error_codes::INVALID_PARAMS,
            McpError::Internal { .. } => error_codes::INTERNAL_ERROR,
            McpError::ConnectionClosed => error_codes::CONNECTION_CLOSED,
            McpError::RequestTimeout { .. } => error_codes::REQUEST_TIMEOUT,
            McpError::Peer { code, .. } => *code,
            _ => error_codes::INTERNAL_ERROR,
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a method not found error
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    /// Create an invalid parameters error
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an abort error with the given reason
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }

    /// Create a capability gate rejection
    pub fn capability(message: impl Into<String>) -> Self {
        Self::CapabilityUnsupported {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Convert into the wire error object for an error response
    pub fn to_error_object(&self) -> ErrorObject {
        ErrorObject {
            code: self.error_code(),
            message: self.to_string(),
            data: match self {
                McpError::Peer { data, .. } => data.clone(),
                _ => None,
            },
        }
    }

    /// Classify a received wire error object back into an error kind
    pub fn from_error_object(error: ErrorObject) -> Self {
        match error.code {
            error_codes::PARSE_ERROR => Self::Parse {
                message: error.message,
            },
            error_codes::INVALID_REQUEST => Self::InvalidRequest {
                message: error.message,
            },
            error_codes::METHOD_NOT_FOUND => Self::MethodNotFound {
                method: error.message,
            },
            error_codes::INVALID_PARAMS => Self::InvalidParams {
                message: error.message,
            },
            error_codes::INTERNAL_ERROR => Self::Internal {
                message: error.message,
            },
            error_codes::CONNECTION_CLOSED => Self::ConnectionClosed,
            error_codes::REQUEST_TIMEOUT => Self::RequestTimeout { timeout_ms: 0 },
            code => Self::Peer {
                code,
                message: error.message,
                data: error.data,
            },
        }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}

impl From<crate::protocol::transport::TransportError> for McpError {
    fn from(err: crate::protocol::transport::TransportError) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_codes_match_taxonomy() {
        assert_eq!(McpError::parse("x").error_code(), -32700);
        assert_eq!(McpError::invalid_request("x").error_code(), -32600);
        assert_eq!(McpError::method_not_found("x").error_code(), -32601);
        assert_eq!(McpError::invalid_params("x").error_code(), -32602);
        assert_eq!(McpError::internal("x").error_code(), -32603);
        assert_eq!(McpError::ConnectionClosed.error_code(), -32000);
        assert_eq!(
            McpError::RequestTimeout { timeout_ms: 100 }.error_code(),
            -32001
        );
    }

    #[test]
    fn wire_round_trip_preserves_code_and_data() {
        let original = ErrorObject::new(-32050, "custom failure").with_data(json!({"hint": 1}));
        let classified = McpError::from_error_object(original.clone());
        match &classified {
            McpError::Peer { code, data, .. } => {
                assert_eq!(*code, -32050);
                assert_eq!(data.as_ref().map(|d| d["hint"].clone()), Some(json!(1)));
            }
            other => panic!("expected Peer, got {other:?}"),
        }
        assert_eq!(classified.to_error_object().code, original.code);
    }

    #[test]
    fn local_kinds_never_claim_wire_codes() {
        assert_eq!(McpError::aborted("user").error_code(), -32603);
        assert_eq!(McpError::capability("sampling").error_code(), -32603);
    }
}
