//! High-Level MCP Client
//!
//! Wraps the protocol engine with the client's capability-assertion table
//! and typed operations. The client initiates `initialize`, the catalog
//! operations (tools, prompts, resources), logging level changes, and
//! completion; it *handles* server-initiated sampling and roots requests.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::{Map, Value};
use tracing::debug;

// Layer 3: Internal module imports
use crate::engine::{
    CapabilityGate, EngineOptions, ProtocolEngine, RequestHandlerContext, RequestOptions,
};
use crate::protocol::constants::methods;
use crate::protocol::messages::{
    CallToolRequest, CompleteRequest, CompleteResult, CompletionArgument, CreateMessageRequest,
    CreateMessageResult, EmptyResult, GetPromptRequest, GetPromptResult, InitializeRequest,
    InitializeResult, InitializedNotification, ListPromptsRequest, ListPromptsResult,
    ListResourceTemplatesRequest, ListResourceTemplatesResult, ListResourcesRequest,
    ListResourcesResult, ListRootsRequest, ListRootsResult, ListToolsRequest, ListToolsResult,
    PingRequest, ReadResourceRequest, ReadResourceResult, RootsListChangedNotification,
    SetLevelRequest, SubscribeRequest, UnsubscribeRequest,
};
use crate::protocol::{
    CallToolResult, ClientCapabilities, Implementation, LogLevel, McpError, McpResult,
    ProtocolVersion, Reference, ServerCapabilities, TransportBuilder,
};

/// MCP session state, separate from transport connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake not attempted yet
    NotInitialized,
    /// `initialize` sent, waiting for the reply
    Initializing,
    /// Handshake complete, server capabilities known
    Ready,
    /// Handshake failed (incompatible version, transport loss)
    Failed,
}

/// Configuration for client behavior
#[derive(Debug, Clone)]
pub struct McpClientConfig {
    /// Client identity sent during initialization
    pub client_info: Implementation,
    /// Capabilities the client advertises
    pub capabilities: ClientCapabilities,
    /// Protocol version requested during initialization
    pub protocol_version: ProtocolVersion,
    /// Default per-request timeout
    pub default_timeout: Duration,
    /// Consult the capability table before every outbound request
    pub enforce_strict_capabilities: bool,
}

impl Default for McpClientConfig {
    fn default() -> Self {
        Self {
            client_info: Implementation::new("mcp-runtime-client", env!("CARGO_PKG_VERSION")),
            capabilities: ClientCapabilities::default(),
            protocol_version: ProtocolVersion::latest(),
            default_timeout: crate::protocol::constants::defaults::REQUEST_TIMEOUT,
            enforce_strict_capabilities: false,
        }
    }
}

/// Builder for [`McpClient`]
#[derive(Default)]
pub struct McpClientBuilder {
    config: McpClientConfig,
}

impl McpClientBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client identity
    pub fn client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.client_info = Implementation::new(name, version);
        self
    }

    /// Set the advertised capabilities
    pub fn capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    /// Set the requested protocol version
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.config.protocol_version = version;
        self
    }

    /// Set the default request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// Enable strict capability checks on every outbound request
    pub fn enforce_strict_capabilities(mut self, strict: bool) -> Self {
        self.config.enforce_strict_capabilities = strict;
        self
    }

    /// Connect over the given transport builder
    pub async fn connect<B: TransportBuilder>(self, transport: B) -> McpResult<McpClient> {
        McpClient::connect(transport, self.config).await
    }
}

/// The client's capability-assertion table
///
/// Outbound requests are checked against the *server's* advertised
/// capabilities; outbound notifications and registered handlers against the
/// client's own declaration.
struct ClientCapabilityGate {
    own: ClientCapabilities,
    server: Arc<StdRwLock<Option<ServerCapabilities>>>,
}

impl ClientCapabilityGate {
    fn server_caps(&self) -> Option<ServerCapabilities> {
        self.server.read().ok().and_then(|s| s.clone())
    }
}

impl CapabilityGate for ClientCapabilityGate {
    fn assert_capability_for_method(&self, method: &str) -> McpResult<()> {
        // Lifecycle methods are always allowed.
        if matches!(method, methods::INITIALIZE | methods::PING) {
            return Ok(());
        }
        let Some(caps) = self.server_caps() else {
            return Err(McpError::capability(format!(
                "{method} requires an initialized session"
            )));
        };
        let allowed = match method {
            methods::TOOLS_LIST | methods::TOOLS_CALL => caps.tools.is_some(),
            methods::PROMPTS_LIST | methods::PROMPTS_GET => caps.prompts.is_some(),
            methods::RESOURCES_LIST
            | methods::RESOURCES_READ
            | methods::RESOURCES_TEMPLATES_LIST => caps.resources.is_some(),
            methods::RESOURCES_SUBSCRIBE | methods::RESOURCES_UNSUBSCRIBE => caps
                .resources
                .as_ref()
                .is_some_and(|r| r.subscribe.unwrap_or(false)),
            methods::LOGGING_SET_LEVEL => caps.logging.is_some(),
            methods::COMPLETION_COMPLETE => caps.completions.is_some(),
            _ => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(McpError::capability(format!(
                "server does not support {method}"
            )))
        }
    }

    fn assert_notification_capability(&self, method: &str) -> McpResult<()> {
        match method {
            methods::ROOTS_LIST_CHANGED => {
                if self
                    .own
                    .roots
                    .as_ref()
                    .is_some_and(|r| r.list_changed.unwrap_or(false))
                {
                    Ok(())
                } else {
                    Err(McpError::capability(
                        "client did not advertise roots.listChanged",
                    ))
                }
            }
            _ => Ok(()),
        }
    }

    fn assert_request_handler_capability(&self, method: &str) -> McpResult<()> {
        let allowed = match method {
            methods::SAMPLING_CREATE_MESSAGE => self.own.sampling.is_some(),
            methods::ROOTS_LIST => self.own.roots.is_some(),
            _ => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(McpError::capability(format!(
                "client did not advertise the capability backing {method}"
            )))
        }
    }
}

/// High-level MCP client
#[derive(Clone)]
pub struct McpClient {
    engine: ProtocolEngine,
    config: McpClientConfig,
    state: Arc<StdRwLock<SessionState>>,
    server_capabilities: Arc<StdRwLock<Option<ServerCapabilities>>>,
    server_info: Arc<StdRwLock<Option<Implementation>>>,
}

impl McpClient {
    /// Connect over the given transport builder
    pub async fn connect<B: TransportBuilder>(
        transport: B,
        config: McpClientConfig,
    ) -> McpResult<Self> {
        let server_capabilities = Arc::new(StdRwLock::new(None));
        let gate = ClientCapabilityGate {
            own: config.capabilities.clone(),
            server: Arc::clone(&server_capabilities),
        };
        let engine = ProtocolEngine::connect(
            transport,
            Box::new(gate),
            EngineOptions {
                enforce_strict_capabilities: config.enforce_strict_capabilities,
            },
        )
        .await?;

        Ok(Self {
            engine,
            config,
            state: Arc::new(StdRwLock::new(SessionState::NotInitialized)),
            server_capabilities,
            server_info: Arc::new(StdRwLock::new(None)),
        })
    }

    fn set_state(&self, state: SessionState) {
        if let Ok(mut slot) = self.state.write() {
            *slot = state;
        }
    }

    /// Current session state
    pub fn session_state(&self) -> SessionState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(SessionState::Failed)
    }

    /// Server capabilities, available once `initialize` succeeded
    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.server_capabilities
            .read()
            .ok()
            .and_then(|s| s.clone())
    }

    /// Server identity, available once `initialize` succeeded
    pub fn server_info(&self) -> Option<Implementation> {
        self.server_info.read().ok().and_then(|s| s.clone())
    }

    /// Access the underlying engine (advanced wiring)
    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    fn options(&self) -> RequestOptions {
        RequestOptions::default().with_timeout(self.config.default_timeout)
    }

    /// Run the `initialize` handshake
    ///
    /// Aborts the connection when the server answers with a protocol
    /// version this runtime does not speak.
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        self.set_state(SessionState::Initializing);

        let request = InitializeRequest::new(
            self.config.protocol_version.as_str(),
            self.config.capabilities.clone(),
            self.config.client_info.clone(),
        );
        let result = match self.engine.send_request(request, self.options()).await {
            Ok(result) => result,
            Err(e) => {
                self.set_state(SessionState::Failed);
                return Err(e);
            }
        };

        if !ProtocolVersion::is_supported(&result.protocol_version) {
            self.set_state(SessionState::Failed);
            let version = result.protocol_version.clone();
            let _ = self.engine.close().await;
            return Err(McpError::UnsupportedProtocolVersion { version });
        }

        if let Ok(mut slot) = self.server_capabilities.write() {
            *slot = Some(result.capabilities.clone());
        }
        if let Ok(mut slot) = self.server_info.write() {
            *slot = Some(result.server_info.clone());
        }

        self.engine
            .send_notification(&InitializedNotification::default())
            .await?;
        self.set_state(SessionState::Ready);
        debug!(server = %result.server_info.name, version = %result.protocol_version, "session ready");
        Ok(result)
    }

    /// Connectivity probe
    pub async fn ping(&self) -> McpResult<EmptyResult> {
        self.engine
            .send_request(PingRequest::default(), self.options())
            .await
    }

    /// List the server's tools
    pub async fn list_tools(&self, cursor: Option<String>) -> McpResult<ListToolsResult> {
        self.engine
            .send_request(ListToolsRequest { cursor }, self.options())
            .await
    }

    /// Invoke a tool
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<Map<String, Value>>,
    ) -> McpResult<CallToolResult> {
        self.engine
            .send_request(CallToolRequest::new(name, arguments), self.options())
            .await
    }

    /// Invoke a tool with explicit request options (timeout, progress,
    /// cancellation)
    pub async fn call_tool_with_options(
        &self,
        name: impl Into<String>,
        arguments: Option<Map<String, Value>>,
        options: RequestOptions,
    ) -> McpResult<CallToolResult> {
        self.engine
            .send_request(CallToolRequest::new(name, arguments), options)
            .await
    }

    /// List the server's prompt templates
    pub async fn list_prompts(&self, cursor: Option<String>) -> McpResult<ListPromptsResult> {
        self.engine
            .send_request(ListPromptsRequest { cursor }, self.options())
            .await
    }

    /// Render a prompt template
    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: Option<HashMap<String, String>>,
    ) -> McpResult<GetPromptResult> {
        self.engine
            .send_request(GetPromptRequest::new(name, arguments), self.options())
            .await
    }

    /// List the server's resources
    pub async fn list_resources(&self, cursor: Option<String>) -> McpResult<ListResourcesResult> {
        self.engine
            .send_request(ListResourcesRequest { cursor }, self.options())
            .await
    }

    /// List the server's resource templates
    pub async fn list_resource_templates(
        &self,
        cursor: Option<String>,
    ) -> McpResult<ListResourceTemplatesResult> {
        self.engine
            .send_request(ListResourceTemplatesRequest { cursor }, self.options())
            .await
    }

    /// Read one resource
    pub async fn read_resource(&self, uri: impl Into<String>) -> McpResult<ReadResourceResult> {
        self.engine
            .send_request(ReadResourceRequest { uri: uri.into() }, self.options())
            .await
    }

    /// Subscribe to change notifications for one resource
    pub async fn subscribe_resource(&self, uri: impl Into<String>) -> McpResult<EmptyResult> {
        self.engine
            .send_request(SubscribeRequest { uri: uri.into() }, self.options())
            .await
    }

    /// Drop a resource subscription
    pub async fn unsubscribe_resource(&self, uri: impl Into<String>) -> McpResult<EmptyResult> {
        self.engine
            .send_request(UnsubscribeRequest { uri: uri.into() }, self.options())
            .await
    }

    /// Set the server's minimum log level
    pub async fn set_logging_level(&self, level: LogLevel) -> McpResult<EmptyResult> {
        self.engine
            .send_request(SetLevelRequest { level }, self.options())
            .await
    }

    /// Request argument completion
    pub async fn complete(
        &self,
        reference: Reference,
        argument_name: impl Into<String>,
        partial_value: impl Into<String>,
    ) -> McpResult<CompleteResult> {
        self.engine
            .send_request(
                CompleteRequest {
                    reference,
                    argument: CompletionArgument {
                        name: argument_name.into(),
                        value: partial_value.into(),
                    },
                },
                self.options(),
            )
            .await
    }

    /// Handle server-initiated `sampling/createMessage`
    ///
    /// Requires the `sampling` capability to be declared.
    pub fn on_create_message<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(CreateMessageRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<CreateMessageResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Handle server-initiated `roots/list`
    ///
    /// Requires the `roots` capability to be declared.
    pub fn on_list_roots<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(ListRootsRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ListRootsResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Announce a change in the exposed roots
    pub async fn notify_roots_list_changed(&self) -> McpResult<()> {
        self.engine
            .send_notification(&RootsListChangedNotification::default())
            .await
    }

    /// Close the connection and drain the engine
    pub async fn close(&self) -> McpResult<()> {
        self.set_state(SessionState::Failed);
        self.engine.close().await
    }
}
