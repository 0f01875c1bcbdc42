//! Logging Messages

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use super::{EmptyResult, McpNotification, McpRequest};
use crate::protocol::constants::methods;
use crate::protocol::types::LogLevel;

/// `logging/setLevel` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetLevelRequest {
    /// Minimum level the client wants to receive
    pub level: LogLevel,
}

impl McpRequest for SetLevelRequest {
    const METHOD: &'static str = methods::LOGGING_SET_LEVEL;
    type Result = EmptyResult;
}

/// `notifications/message` payload, a structured log record from the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingMessageNotification {
    /// Severity of the record
    pub level: LogLevel,
    /// Name of the emitting logger
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// Arbitrary structured payload
    pub data: Value,
}

impl McpNotification for LoggingMessageNotification {
    const METHOD: &'static str = methods::LOGGING_MESSAGE;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn levels_use_lowercase_wire_names() {
        let request = SetLevelRequest {
            level: LogLevel::Warning,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"level": "warning"})
        );
    }
}
