//! MCP Protocol Constants
//!
//! This module defines constants for MCP protocol method names, protocol
//! versions, headers, and other standardized values to ensure consistency
//! and reduce typos.

/// MCP protocol method names
pub mod methods {
    /// Initialization method
    pub const INITIALIZE: &str = "initialize";
    /// Initialized notification
    pub const INITIALIZED: &str = "notifications/initialized";

    /// Resource-related methods
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
    pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
    pub const RESOURCES_UPDATED: &str = "notifications/resources/updated";
    pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";

    /// Tool-related methods
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

    /// Prompt-related methods
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
    pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";

    /// Logging-related methods
    pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
    pub const LOGGING_MESSAGE: &str = "notifications/message";

    /// Sampling (server-initiated LLM calls against the client)
    pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";

    /// Roots (server-initiated enumeration of client filesystem roots)
    pub const ROOTS_LIST: &str = "roots/list";
    pub const ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";

    /// Argument completion
    pub const COMPLETION_COMPLETE: &str = "completion/complete";

    /// Lifecycle notifications
    pub const CANCELLED: &str = "notifications/cancelled";
    pub const PROGRESS: &str = "notifications/progress";

    /// Connectivity testing method
    pub const PING: &str = "ping";
}

/// JSON-RPC error codes
pub mod error_codes {
    /// Parse error - Invalid JSON was received by the server
    pub const PARSE_ERROR: i32 = -32700;

    /// Invalid Request - The JSON sent is not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;

    /// Method not found - The method does not exist / is not available
    pub const METHOD_NOT_FOUND: i32 = -32601;

    /// Invalid params - Invalid method parameter(s)
    pub const INVALID_PARAMS: i32 = -32602;

    /// Internal error - Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Connection closed - the transport ended before the response arrived
    pub const CONNECTION_CLOSED: i32 = -32000;

    /// Request timeout - the per-request timer fired
    pub const REQUEST_TIMEOUT: i32 = -32001;
}

/// Protocol version identifiers
pub mod versions {
    /// Latest protocol version implemented by this runtime
    pub const LATEST: &str = "2025-03-26";

    /// All versions this runtime can speak, newest first
    pub const SUPPORTED: &[&str] = &["2025-03-26", "2024-11-05", "2024-10-07"];
}

/// HTTP header names used by the Streamable HTTP transport
pub mod headers {
    /// Session identity issued by the server on initialize
    pub const MCP_SESSION_ID: &str = "mcp-session-id";

    /// SSE resumption cursor
    pub const LAST_EVENT_ID: &str = "last-event-id";
}

/// Default values for MCP protocol
pub mod defaults {
    use std::time::Duration;

    /// Default per-request timeout
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Interval between SSE keep-alive comments
    pub const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

    /// Maximum accepted POST body on the legacy SSE message endpoint
    pub const SSE_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

    /// Reconnect backoff parameters for the Streamable HTTP client
    pub const RECONNECT_INITIAL_DELAY: Duration = Duration::from_secs(1);
    pub const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);
    pub const RECONNECT_GROW_FACTOR: f64 = 1.5;
    pub const RECONNECT_MAX_RETRIES: u32 = 10;
}
