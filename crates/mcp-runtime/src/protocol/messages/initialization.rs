//! Initialization Messages
//!
//! The `initialize` handshake and the `notifications/initialized`
//! acknowledgment. The request carries the raw protocol version string so a
//! server can run version negotiation against values it does not itself
//! speak; the *result* version is validated by the client before the
//! connection is considered usable.

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::{McpNotification, McpRequest};
use crate::protocol::constants::methods;
use crate::protocol::types::{ClientCapabilities, Implementation, ServerCapabilities};

/// `initialize` request parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Protocol version the client wants to speak (raw; may be unknown here)
    pub protocol_version: String,
    /// Capabilities the client advertises
    pub capabilities: ClientCapabilities,
    /// Client implementation descriptor
    pub client_info: Implementation,
}

impl InitializeRequest {
    /// Create an initialize request for the given client identity
    pub fn new(
        protocol_version: impl Into<String>,
        capabilities: ClientCapabilities,
        client_info: Implementation,
    ) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            capabilities,
            client_info,
        }
    }
}

/// `initialize` result payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version the server selected
    pub protocol_version: String,
    /// Capabilities the server advertises
    pub capabilities: ServerCapabilities,
    /// Server implementation descriptor
    pub server_info: Implementation,
    /// Optional usage instructions for the host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl McpRequest for InitializeRequest {
    const METHOD: &'static str = methods::INITIALIZE;
    type Result = InitializeResult;
}

/// `notifications/initialized`; carries no parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct InitializedNotification {}

impl McpNotification for InitializedNotification {
    const METHOD: &'static str = methods::INITIALIZED;
}
