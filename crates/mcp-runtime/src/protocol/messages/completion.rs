//! Completion Messages
//!
//! Argument completion for prompt arguments and resource template variables.

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::McpRequest;
use crate::protocol::constants::methods;
use crate::protocol::types::Reference;

/// The argument being completed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionArgument {
    /// Argument name
    pub name: String,
    /// Partial value typed so far
    pub value: String,
}

/// `completion/complete` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteRequest {
    /// What the argument belongs to
    #[serde(rename = "ref")]
    pub reference: Reference,
    /// The argument and its partial value
    pub argument: CompletionArgument,
}

/// Completion candidates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// Candidate values, at most 100
    pub values: Vec<String>,
    /// Total number of matches, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Whether more candidates exist beyond `values`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

/// `completion/complete` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteResult {
    /// The candidates
    pub completion: Completion,
}

impl McpRequest for CompleteRequest {
    const METHOD: &'static str = methods::COMPLETION_COMPLETE;
    type Result = CompleteResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reference_is_type_tagged() {
        let request = CompleteRequest {
            reference: Reference::Prompt {
                name: "greet".to_string(),
            },
            argument: CompletionArgument {
                name: "who".to_string(),
                value: "wo".to_string(),
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["ref"]["type"], json!("ref/prompt"));
        assert_eq!(value["argument"]["value"], json!("wo"));
    }
}
