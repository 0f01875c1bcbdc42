//! Protocol Layer - JSON-RPC 2.0 Envelope and MCP Payloads
//!
//! This module provides the wire-level foundation shared by every other
//! layer: the JSON-RPC envelope, typed MCP payloads, the transport contract,
//! and the unified error hierarchy.
//!
//! ## Module Organization
//!
//! - `message`: JSON-RPC 2.0 envelope variants with trait-based serialization
//! - `types`: MCP domain types (capabilities, content, tools, prompts, resources)
//! - `messages`: typed per-method request/result payloads
//! - `transport`: transport abstraction traits and error types
//! - `errors`: consolidated error types for all protocol operations
//! - `constants`: method names, versions, error codes, defaults

// Module declarations (declarations only in mod.rs)
pub mod constants;
pub mod errors;
pub mod message;
pub mod messages;
pub mod transport;
pub mod types;

// Public re-exports (clean API surface)
pub use errors::{ErrorObject, McpError, McpResult};
pub use message::{
    extract_meta, inject_meta, JsonRpcError, JsonRpcMessage, JsonRpcMessageTrait,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Meta, ProgressToken, RequestId,
    JSONRPC_VERSION,
};
pub use messages::{parse_params, to_params, McpNotification, McpRequest};
pub use transport::{
    MessageContext, MessageHandler, Transport, TransportBuilder, TransportError,
};
pub use types::{
    CallToolResult, ClientCapabilities, CompletionsCapability, Content, Implementation, LogLevel,
    LoggingCapability, Prompt, PromptArgument, PromptMessage, PromptsCapability, ProtocolVersion,
    Reference, Resource, ResourceContents, ResourceTemplate, ResourcesCapability, Role, Root,
    RootsCapability, SamplingCapability, ServerCapabilities, Tool, ToolAnnotations, ToolSchema,
    ToolsCapability,
};
