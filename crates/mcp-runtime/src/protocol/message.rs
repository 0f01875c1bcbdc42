//! JSON-RPC 2.0 Envelope Implementation
//!
//! This module provides the four JSON-RPC 2.0 envelope variants used by the
//! MCP runtime (request, notification, response, error) with shared
//! serialization behavior through a trait.
//!
//! # Architecture
//!
//! Individual envelope structs derive their serde encoding; *decoding* of the
//! unified [`JsonRpcMessage`] enum is hand-rolled and tags by field presence
//! (`id` / `method` / `result` / `error`). This keeps two invariants that an
//! untagged derive cannot express:
//!
//! - a `jsonrpc` value other than the literal `"2.0"` is a parse error, and
//! - a response carrying both `result` and `error` is rejected instead of
//!   silently matching the first variant that fits.
//!
//! # Examples
//!
//! ```rust
//! use mcp_runtime::protocol::{JsonRpcMessage, JsonRpcMessageTrait, JsonRpcRequest, RequestId};
//!
//! let request = JsonRpcRequest::new("ping", None, RequestId::Number(1));
//! let json = request.to_json().unwrap();
//! let parsed = JsonRpcMessage::from_json(&json).unwrap();
//! assert_eq!(parsed, JsonRpcMessage::Request(request));
//! ```

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use crate::protocol::errors::{ErrorObject, McpError, McpResult};

/// The JSON-RPC protocol version literal
pub const JSONRPC_VERSION: &str = "2.0";

/// Key under which out-of-band metadata is tunneled inside `params`/`result`
pub const META_KEY: &str = "_meta";

/// Request ID supporting both numeric and string formats per JSON-RPC 2.0
///
/// The engine only *generates* numeric ids from a monotonic counter, but the
/// decoder accepts string ids so foreign peers stay interoperable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request identifier
    Number(i64),
    /// String-based request identifier
    String(String),
}

impl RequestId {
    /// Numeric value, if this id is numeric
    pub fn as_number(&self) -> Option<i64> {
        match self {
            RequestId::Number(n) => Some(*n),
            RequestId::String(_) => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// Progress token carried in a request's `_meta`
///
/// The engine only issues integer tokens; string tokens are accepted on
/// decode for interoperability but are dropped (with a warning) when they
/// cannot be matched to an outstanding request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    /// Integer token, matched against outstanding outbound request ids
    Number(i64),
    /// Opaque string token
    String(String),
}

impl ProgressToken {
    /// Integer value, if this token is numeric
    pub fn as_number(&self) -> Option<i64> {
        match self {
            ProgressToken::Number(n) => Some(*n),
            ProgressToken::String(_) => None,
        }
    }
}

/// Parsed `_meta` object stripped out of `params` or `result`
///
/// `progressToken` is surfaced as a typed field; all other keys ride along in
/// `extra` untouched so unknown tunneled data survives a round-trip.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Meta {
    /// Progress token from a request's `_meta`
    pub progress_token: Option<ProgressToken>,
    /// Remaining `_meta` entries, preserved verbatim
    pub extra: Map<String, Value>,
}

impl Meta {
    /// Create a meta object carrying only a progress token
    pub fn with_progress_token(token: ProgressToken) -> Self {
        Self {
            progress_token: Some(token),
            extra: Map::new(),
        }
    }

    /// True when there is nothing to encode
    pub fn is_empty(&self) -> bool {
        self.progress_token.is_none() && self.extra.is_empty()
    }

    /// Parse from the raw `_meta` JSON object
    pub fn from_value(value: Value) -> Self {
        let mut extra = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let progress_token = extra
            .remove("progressToken")
            .and_then(|v| serde_json::from_value(v).ok());
        Self {
            progress_token,
            extra,
        }
    }

    /// Encode back into the raw `_meta` JSON object
    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        if let Some(token) = &self.progress_token {
            if let Ok(v) = serde_json::to_value(token) {
                map.insert("progressToken".to_string(), v);
            }
        }
        Value::Object(map)
    }
}

/// Strip `_meta` out of a params/result object, surfacing it separately
pub fn extract_meta(params: &mut Option<Value>) -> Option<Meta> {
    let obj = params.as_mut()?.as_object_mut()?;
    obj.remove(META_KEY).map(Meta::from_value)
}

/// Nest a meta object back under `params._meta` (canonical encoding)
pub fn inject_meta(params: Option<Value>, meta: &Meta) -> Option<Value> {
    if meta.is_empty() {
        return params;
    }
    let mut obj = match params {
        Some(Value::Object(map)) => map,
        Some(other) => return Some(other),
        None => Map::new(),
    };
    obj.insert(META_KEY.to_string(), meta.to_value());
    Some(Value::Object(obj))
}

/// JSON-RPC envelope variants
///
/// This enum unifies all JSON-RPC 2.0 message types into a single type for
/// transport and handling. Variants are distinguished on the wire by the
/// presence of `id`, `method`, `result`, and `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Method invocation expecting a response
    Request(JsonRpcRequest),
    /// One-way method invocation
    Notification(JsonRpcNotification),
    /// Successful response to a request
    Response(JsonRpcResponse),
    /// Error response to a request
    Error(JsonRpcError),
}

impl JsonRpcMessage {
    /// Decode an envelope from a parsed JSON value
    ///
    /// # Errors
    ///
    /// Returns `McpError::Parse` when the value is not an object, carries a
    /// `jsonrpc` other than `"2.0"`, or matches none of the four variants.
    pub fn from_value(value: Value) -> McpResult<Self> {
        let mut obj = match value {
            Value::Object(obj) => obj,
            other => {
                return Err(McpError::parse(format!(
                    "expected a JSON object, got {other}"
                )))
            }
        };

        match obj.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            Some(other) => {
                return Err(McpError::parse(format!(
                    "unsupported jsonrpc version {other:?}"
                )))
            }
            None => return Err(McpError::parse("missing jsonrpc version field")),
        }

        let has_id = obj.contains_key("id");
        let has_method = obj.contains_key("method");
        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");

        if has_method {
            let method = match obj.remove("method") {
                Some(Value::String(m)) => m,
                _ => return Err(McpError::parse("method must be a string")),
            };
            let params = obj.remove("params");
            if has_id {
                let id = decode_id(obj.remove("id"))?
                    .ok_or_else(|| McpError::parse("request id must not be null"))?;
                Ok(JsonRpcMessage::Request(JsonRpcRequest {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    method,
                    params,
                    id,
                }))
            } else {
                Ok(JsonRpcMessage::Notification(JsonRpcNotification {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    method,
                    params,
                }))
            }
        } else if has_error {
            if has_result {
                return Err(McpError::parse(
                    "response must not carry both result and error",
                ));
            }
            let error: ErrorObject = obj
                .remove("error")
                .map(serde_json::from_value)
                .transpose()?
                .ok_or_else(|| McpError::parse("malformed error object"))?;
            let id = decode_id(obj.remove("id"))?;
            Ok(JsonRpcMessage::Error(JsonRpcError {
                jsonrpc: JSONRPC_VERSION.to_string(),
                error,
                id,
            }))
        } else if has_result {
            let id = decode_id(obj.remove("id"))?
                .ok_or_else(|| McpError::parse("response id must not be null"))?;
            let result = obj.remove("result").unwrap_or(Value::Null);
            Ok(JsonRpcMessage::Response(JsonRpcResponse {
                jsonrpc: JSONRPC_VERSION.to_string(),
                result,
                id,
            }))
        } else {
            Err(McpError::parse(
                "envelope has neither method, result, nor error",
            ))
        }
    }

    /// Method name, for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.method),
            JsonRpcMessage::Notification(n) => Some(&n.method),
            _ => None,
        }
    }

    /// Request id, for every variant that carries one
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.id),
            JsonRpcMessage::Response(r) => Some(&r.id),
            JsonRpcMessage::Error(e) => e.id.as_ref(),
            JsonRpcMessage::Notification(_) => None,
        }
    }
}

fn decode_id(id: Option<Value>) -> McpResult<Option<RequestId>> {
    match id {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|_| McpError::parse("request id must be a string or integer")),
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        JsonRpcMessage::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Trait for JSON-RPC message serialization and deserialization
///
/// Any type that implements `Serialize + Deserialize` gets the default
/// implementations for JSON conversion, eliminating duplicated encode code
/// across the envelope structs.
pub trait JsonRpcMessageTrait: Serialize + for<'de> Deserialize<'de> {
    /// Serialize this message to a JSON string
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string
    fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize directly into a byte buffer, avoiding an intermediate String
    fn serialize_to_buffer(&self, buffer: &mut BytesMut) -> Result<(), serde_json::Error> {
        serde_json::to_writer(buffer.writer(), self)
    }

    /// Serialize this message to bytes
    fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        let mut buffer = BytesMut::with_capacity(256);
        self.serialize_to_buffer(&mut buffer)?;
        Ok(buffer.freeze())
    }

    /// Deserialize a message from JSON bytes
    fn from_json_bytes(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }
}

impl JsonRpcMessageTrait for JsonRpcMessage {}
impl JsonRpcMessageTrait for JsonRpcRequest {}
impl JsonRpcMessageTrait for JsonRpcNotification {}
impl JsonRpcMessageTrait for JsonRpcResponse {}
impl JsonRpcMessageTrait for JsonRpcError {}

/// JSON-RPC 2.0 request message
///
/// `params` holds the raw parameter object; typed decoding (including `_meta`
/// extraction) happens at the payload layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Protocol version, always `"2.0"`
    pub jsonrpc: String,

    /// Name of the method to invoke
    pub method: String,

    /// Parameters for the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Unique identifier for this request
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request
    pub fn new(method: impl Into<String>, params: Option<Value>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: id.into(),
        }
    }

    /// Parse this request's `_meta`, if present
    pub fn meta(&self) -> Option<Meta> {
        self.params
            .as_ref()
            .and_then(|p| p.get(META_KEY))
            .cloned()
            .map(Meta::from_value)
    }
}

/// JSON-RPC 2.0 notification message
///
/// Identical to a request except for the missing `id`; notifications never
/// receive a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    /// Protocol version, always `"2.0"`
    pub jsonrpc: String,

    /// Name of the notification method
    pub method: String,

    /// Parameters for the notification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC 2.0 notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 success response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    /// Protocol version, always `"2.0"`
    pub jsonrpc: String,

    /// Result of the method invocation
    pub result: Value,

    /// Identifier of the request being answered
    pub id: RequestId,
}

impl JsonRpcResponse {
    /// Create a success response for the given request id
    pub fn new(result: Value, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result,
            id: id.into(),
        }
    }
}

/// JSON-RPC 2.0 error response
///
/// `id` is `None` only when the failure could not be attributed to a request
/// (e.g. a parse error on the inbound bytes).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    /// Protocol version, always `"2.0"`
    pub jsonrpc: String,

    /// Error details
    pub error: ErrorObject,

    /// Identifier of the failed request, null for parse errors
    pub id: Option<RequestId>,
}

impl JsonRpcError {
    /// Create an error response for the given request id
    pub fn new(error: ErrorObject, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            error,
            id,
        }
    }
}
