//! Typed MCP Method Payloads
//!
//! One module per method family. Each request type carries its method name
//! and result type through the [`McpRequest`] trait so the engine's handler
//! registry and the client facade can move between the generic envelope and
//! typed payloads without stringly-typed glue.

// Layer 1: Standard library imports
// (None required for module declarations)

// Layer 2: Third-party crate imports
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

// Layer 3: Internal module imports
use crate::protocol::errors::{McpError, McpResult};

pub mod common;
pub mod completion;
pub mod initialization;
pub mod logging;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
pub mod tools;

pub use common::*;
pub use completion::*;
pub use initialization::*;
pub use logging::*;
pub use prompts::*;
pub use resources::*;
pub use roots::*;
pub use sampling::*;
pub use tools::*;

/// A typed MCP request payload bound to its method name and result type
pub trait McpRequest: Serialize + DeserializeOwned + Send + 'static {
    /// Wire method name
    const METHOD: &'static str;

    /// Typed result payload
    type Result: Serialize + DeserializeOwned + Send + 'static;
}

/// A typed MCP notification payload bound to its method name
pub trait McpNotification: Serialize + DeserializeOwned + Send + 'static {
    /// Wire method name
    const METHOD: &'static str;
}

/// Decode a typed payload from an envelope's generic `params`
///
/// Absent or `null` params decode as the empty object, which every
/// parameterless payload accepts. `_meta` has already been stripped by the
/// engine; stray unknown keys are ignored by serde defaults.
pub fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let value = match params {
        None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
        Some(value) => value,
    };
    serde_json::from_value(value).map_err(|e| McpError::invalid_params(e.to_string()))
}

/// Encode a typed payload into an envelope's `params` slot
///
/// Payloads that serialize to an empty object are sent without `params`.
pub fn to_params<T: Serialize>(payload: &T) -> McpResult<Option<Value>> {
    let value = serde_json::to_value(payload)
        .map_err(|e| McpError::internal(format!("params encoding failed: {e}")))?;
    match &value {
        Value::Object(map) if map.is_empty() => Ok(None),
        _ => Ok(Some(value)),
    }
}
