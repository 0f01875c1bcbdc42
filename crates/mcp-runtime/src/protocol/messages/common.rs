//! Lifecycle Messages Shared by Both Roles
//!
//! Ping, progress, and cancellation payloads. These are the methods the
//! engine always has handlers for, regardless of role.

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::{McpNotification, McpRequest};
use crate::protocol::constants::methods;
use crate::protocol::message::{ProgressToken, RequestId};

/// `ping` request; carries no parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PingRequest {}

/// Empty result object used by ping and the write-style requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EmptyResult {}

impl McpRequest for PingRequest {
    const METHOD: &'static str = methods::PING;
    type Result = EmptyResult;
}

/// `notifications/progress` payload
///
/// `progress_token` echoes the token the requester placed in `_meta`; the
/// engine matches integer tokens against outstanding outbound requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNotification {
    /// Token identifying the request this progress belongs to
    pub progress_token: ProgressToken,
    /// Work completed so far
    pub progress: f64,
    /// Total work, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// Human-readable progress message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl McpNotification for ProgressNotification {
    const METHOD: &'static str = methods::PROGRESS;
}

/// `notifications/cancelled` payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CancelledNotification {
    /// Id of the request being cancelled
    pub request_id: RequestId,
    /// Why the request was cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CancelledNotification {
    /// Create a cancellation notice for the given request
    pub fn new(request_id: RequestId, reason: Option<String>) -> Self {
        Self { request_id, reason }
    }
}

impl McpNotification for CancelledNotification {
    const METHOD: &'static str = methods::CANCELLED;
}
