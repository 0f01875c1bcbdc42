//! Prompt Messages

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::{McpNotification, McpRequest};
use crate::protocol::constants::methods;
use crate::protocol::types::{Prompt, PromptMessage};

/// `prompts/list` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ListPromptsRequest {
    /// Pagination cursor from a previous result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// `prompts/list` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListPromptsResult {
    /// Available prompt templates
    pub prompts: Vec<Prompt>,
    /// Cursor for the next page, when more prompts exist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl McpRequest for ListPromptsRequest {
    const METHOD: &'static str = methods::PROMPTS_LIST;
    type Result = ListPromptsResult;
}

/// `prompts/get` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetPromptRequest {
    /// Name of the prompt template
    pub name: String,
    /// Template argument values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

impl GetPromptRequest {
    /// Create a prompt render request
    pub fn new(name: impl Into<String>, arguments: Option<HashMap<String, String>>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// `prompts/get` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetPromptResult {
    /// Description of the rendered prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rendered conversation messages
    pub messages: Vec<PromptMessage>,
}

impl McpRequest for GetPromptRequest {
    const METHOD: &'static str = methods::PROMPTS_GET;
    type Result = GetPromptResult;
}

/// `notifications/prompts/list_changed`; carries no parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PromptListChangedNotification {}

impl McpNotification for PromptListChangedNotification {
    const METHOD: &'static str = methods::PROMPTS_LIST_CHANGED;
}
