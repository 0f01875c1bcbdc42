//! Tool Messages
//!
//! Discovery and invocation of server-exposed tools.

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use super::{McpNotification, McpRequest};
use crate::protocol::constants::methods;
use crate::protocol::types::{CallToolResult, Tool};

/// `tools/list` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ListToolsRequest {
    /// Pagination cursor from a previous result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// `tools/list` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    /// Available tools
    pub tools: Vec<Tool>,
    /// Cursor for the next page, when more tools exist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl McpRequest for ListToolsRequest {
    const METHOD: &'static str = methods::TOOLS_LIST;
    type Result = ListToolsResult;
}

/// `tools/call` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolRequest {
    /// Name of the tool to invoke
    pub name: String,
    /// Arguments object, passed through without validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

impl CallToolRequest {
    /// Create a tool call with the given arguments
    pub fn new(name: impl Into<String>, arguments: Option<Map<String, Value>>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

impl McpRequest for CallToolRequest {
    const METHOD: &'static str = methods::TOOLS_CALL;
    type Result = CallToolResult;
}

/// `notifications/tools/list_changed`; carries no parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ToolListChangedNotification {}

impl McpNotification for ToolListChangedNotification {
    const METHOD: &'static str = methods::TOOLS_LIST_CHANGED;
}
