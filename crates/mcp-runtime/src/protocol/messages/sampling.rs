//! Sampling Messages
//!
//! `sampling/createMessage` lets a server ask the *client* to run an LLM
//! completion on its behalf. The client owns model access and user consent;
//! the server only describes the conversation it wants sampled.

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use super::McpRequest;
use crate::protocol::constants::methods;
use crate::protocol::types::{Content, Role};

/// One turn of the conversation to sample
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingMessage {
    /// Role of the turn
    pub role: Role,
    /// Content of the turn
    pub content: Content,
}

/// Soft preference for which model family the client should pick
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModelHint {
    /// Substring matched against model names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Server preferences for model selection; all advisory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelPreferences {
    /// Ordered hints, strongest first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<ModelHint>>,
    /// Relative weight for low cost (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,
    /// Relative weight for low latency (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,
    /// Relative weight for capability (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intelligence_priority: Option<f64>,
}

/// How much MCP context the client should include in the sampled prompt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IncludeContext {
    /// No server context
    None,
    /// Context from the requesting server only
    ThisServer,
    /// Context from every connected server
    AllServers,
}

/// `sampling/createMessage` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    /// Conversation to sample
    pub messages: Vec<SamplingMessage>,
    /// Model selection preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    /// System prompt to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// MCP context inclusion policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_context: Option<IncludeContext>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to sample
    pub max_tokens: u64,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Provider-specific metadata, pass-through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// `sampling/createMessage` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageResult {
    /// Role of the sampled turn (always assistant in practice)
    pub role: Role,
    /// Sampled content
    pub content: Content,
    /// Name of the model that produced the turn
    pub model: String,
    /// Why sampling stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl McpRequest for CreateMessageRequest {
    const METHOD: &'static str = methods::SAMPLING_CREATE_MESSAGE;
    type Result = CreateMessageResult;
}
