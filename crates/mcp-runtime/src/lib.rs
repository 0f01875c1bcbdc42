//! MCP Runtime - Model Context Protocol Implementation
//!
//! A bidirectional JSON-RPC 2.0 runtime for the Model Context Protocol:
//! a *host* (typically an LLM agent) discovers and invokes tools,
//! resources, and prompts exposed by a *server*, while the server can
//! initiate its own operations (sampling, roots enumeration, logging)
//! against the client. Both roles share one protocol engine; only the
//! capability tables and initiation direction differ.
//!
//! # Architecture
//!
//! The crate is organized in layers:
//!
//! - **Protocol Layer** (`protocol`): JSON-RPC 2.0 envelope, typed MCP
//!   payloads, the transport contract, and the error hierarchy
//! - **Engine Layer** (`engine`): request/response correlation, per-request
//!   timeouts with progress-driven extension, cooperative cancellation,
//!   capability gating, handler dispatch
//! - **Transport Layer** (`transport`): stdio/child-process/in-memory byte
//!   streams, the legacy HTTP+SSE server, and the Streamable HTTP server
//!   and client with event-store-backed resumability
//! - **Integration Layer** (`integration`): the high-level [`McpClient`]
//!   and [`McpServer`] facades
//!
//! # Quick Start
//!
//! Wiring a client and server over in-memory pipes:
//!
//! ```rust
//! use mcp_runtime::integration::{McpClientBuilder, McpServerBuilder};
//! use mcp_runtime::protocol::{ServerCapabilities, ToolsCapability};
//! use mcp_runtime::transport::duplex_pair;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (client_side, server_side) = duplex_pair(64 * 1024);
//!
//! let server = McpServerBuilder::new()
//!     .server_info("example-server", "1.0.0")
//!     .capabilities(ServerCapabilities {
//!         tools: Some(ToolsCapability::default()),
//!         ..Default::default()
//!     })
//!     .connect(server_side)
//!     .await?;
//! server.on_list_tools(|_request, _context| async move {
//!     Ok(mcp_runtime::protocol::messages::ListToolsResult {
//!         tools: vec![],
//!         next_cursor: None,
//!     })
//! })?;
//!
//! let client = McpClientBuilder::new()
//!     .client_info("example-client", "1.0.0")
//!     .connect(client_side)
//!     .await?;
//! let initialized = client.initialize().await?;
//! assert_eq!(initialized.server_info.name, "example-server");
//!
//! let tools = client.list_tools(None).await?;
//! assert!(tools.tools.is_empty());
//!
//! client.close().await?;
//! server.close().await?;
//! # Ok(())
//! # }
//! ```

// Engine layer modules
pub mod engine;

// Integration layer modules
pub mod integration;

// Protocol layer modules
pub mod protocol;

// Transport layer modules
pub mod transport;

// Re-export commonly used types for convenience
pub use engine::{
    AllowAllCapabilities, CapabilityGate, EngineOptions, ProtocolEngine, RequestHandlerContext,
    RequestOptions,
};
pub use integration::{McpClient, McpClientBuilder, McpServer, McpServerBuilder};
pub use protocol::{
    CallToolResult, ClientCapabilities, Content, ErrorObject, Implementation, JsonRpcError,
    JsonRpcMessage, JsonRpcMessageTrait, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    McpError, McpResult, MessageContext, MessageHandler, ProgressToken, ProtocolVersion,
    RequestId, ServerCapabilities, Tool, ToolSchema, Transport, TransportBuilder, TransportError,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
