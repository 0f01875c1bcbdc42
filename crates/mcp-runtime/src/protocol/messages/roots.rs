//! Roots Messages
//!
//! `roots/list` is server-initiated: the server asks the client which
//! filesystem roots it may operate within.

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::{McpNotification, McpRequest};
use crate::protocol::constants::methods;
use crate::protocol::types::Root;

/// `roots/list` request; carries no parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ListRootsRequest {}

/// `roots/list` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListRootsResult {
    /// Roots the client exposes; URIs are always `file://`
    pub roots: Vec<Root>,
}

impl McpRequest for ListRootsRequest {
    const METHOD: &'static str = methods::ROOTS_LIST;
    type Result = ListRootsResult;
}

/// `notifications/roots/list_changed`; carries no parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RootsListChangedNotification {}

impl McpNotification for RootsListChangedNotification {
    const METHOD: &'static str = methods::ROOTS_LIST_CHANGED;
}
