//! Resource Messages
//!
//! Discovery, reading, and change subscription for server-exposed resources.

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::{EmptyResult, McpNotification, McpRequest};
use crate::protocol::constants::methods;
use crate::protocol::types::{Resource, ResourceContents, ResourceTemplate};

/// `resources/list` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ListResourcesRequest {
    /// Pagination cursor from a previous result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// `resources/list` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListResourcesResult {
    /// Available resources
    pub resources: Vec<Resource>,
    /// Cursor for the next page, when more resources exist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl McpRequest for ListResourcesRequest {
    const METHOD: &'static str = methods::RESOURCES_LIST;
    type Result = ListResourcesResult;
}

/// `resources/templates/list` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ListResourceTemplatesRequest {
    /// Pagination cursor from a previous result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// `resources/templates/list` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListResourceTemplatesResult {
    /// Available resource templates
    pub resource_templates: Vec<ResourceTemplate>,
    /// Cursor for the next page, when more templates exist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl McpRequest for ListResourceTemplatesRequest {
    const METHOD: &'static str = methods::RESOURCES_TEMPLATES_LIST;
    type Result = ListResourceTemplatesResult;
}

/// `resources/read` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadResourceRequest {
    /// URI of the resource to read
    pub uri: String,
}

/// `resources/read` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadResourceResult {
    /// Contents of the resource (possibly multiple representations)
    pub contents: Vec<ResourceContents>,
}

impl McpRequest for ReadResourceRequest {
    const METHOD: &'static str = methods::RESOURCES_READ;
    type Result = ReadResourceResult;
}

/// `resources/subscribe` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscribeRequest {
    /// URI of the resource to watch
    pub uri: String,
}

impl McpRequest for SubscribeRequest {
    const METHOD: &'static str = methods::RESOURCES_SUBSCRIBE;
    type Result = EmptyResult;
}

/// `resources/unsubscribe` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnsubscribeRequest {
    /// URI of the resource to stop watching
    pub uri: String,
}

impl McpRequest for UnsubscribeRequest {
    const METHOD: &'static str = methods::RESOURCES_UNSUBSCRIBE;
    type Result = EmptyResult;
}

/// `notifications/resources/updated` payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceUpdatedNotification {
    /// URI of the resource that changed
    pub uri: String,
}

impl McpNotification for ResourceUpdatedNotification {
    const METHOD: &'static str = methods::RESOURCES_UPDATED;
}

/// `notifications/resources/list_changed`; carries no parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResourceListChangedNotification {}

impl McpNotification for ResourceListChangedNotification {
    const METHOD: &'static str = methods::RESOURCES_LIST_CHANGED;
}
