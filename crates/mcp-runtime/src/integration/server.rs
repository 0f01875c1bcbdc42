//! High-Level MCP Server
//!
//! Wraps the protocol engine with the server's capability-assertion table,
//! the `initialize` version negotiation, and registration seams for tool,
//! prompt, resource, logging, and completion handlers. Server-initiated
//! sampling and roots calls are gated on the capabilities the *client*
//! declared during the handshake.

// Layer 1: Standard library imports
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::Value;
use tracing::debug;

// Layer 3: Internal module imports
use crate::engine::{
    CapabilityGate, EngineOptions, ProtocolEngine, RequestHandlerContext, RequestOptions,
};
use crate::protocol::constants::methods;
use crate::protocol::messages::{
    CallToolRequest, CompleteRequest, CompleteResult, CreateMessageRequest, CreateMessageResult,
    EmptyResult, GetPromptRequest, GetPromptResult, InitializeRequest, InitializeResult,
    InitializedNotification, ListPromptsRequest, ListPromptsResult,
    ListResourceTemplatesRequest, ListResourceTemplatesResult, ListResourcesRequest,
    ListResourcesResult, ListRootsRequest, ListRootsResult, ListToolsRequest, ListToolsResult,
    LoggingMessageNotification, PromptListChangedNotification, ReadResourceRequest,
    ReadResourceResult, ResourceListChangedNotification, ResourceUpdatedNotification,
    SetLevelRequest, SubscribeRequest, ToolListChangedNotification, UnsubscribeRequest,
};
use crate::protocol::{
    CallToolResult, ClientCapabilities, Implementation, LogLevel, McpError, McpResult,
    ProtocolVersion, ServerCapabilities, TransportBuilder,
};

/// Configuration for server behavior
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server identity sent during initialization
    pub server_info: Implementation,
    /// Capabilities the server advertises
    pub capabilities: ServerCapabilities,
    /// Optional usage instructions included in the initialize result
    pub instructions: Option<String>,
    /// Default timeout for server-initiated requests
    pub default_timeout: Duration,
    /// Consult the capability table before every outbound request
    pub enforce_strict_capabilities: bool,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            server_info: Implementation::new("mcp-runtime-server", env!("CARGO_PKG_VERSION")),
            capabilities: ServerCapabilities::default(),
            instructions: None,
            default_timeout: crate::protocol::constants::defaults::REQUEST_TIMEOUT,
            enforce_strict_capabilities: false,
        }
    }
}

/// Builder for [`McpServer`]
#[derive(Default)]
pub struct McpServerBuilder {
    config: McpServerConfig,
}

impl McpServerBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server identity
    pub fn server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.server_info = Implementation::new(name, version);
        self
    }

    /// Set the advertised capabilities
    pub fn capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    /// Set the instructions included in the initialize result
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = Some(instructions.into());
        self
    }

    /// Enable strict capability checks on every outbound request
    pub fn enforce_strict_capabilities(mut self, strict: bool) -> Self {
        self.config.enforce_strict_capabilities = strict;
        self
    }

    /// Connect over the given transport builder
    pub async fn connect<B: TransportBuilder>(self, transport: B) -> McpResult<McpServer> {
        McpServer::connect(transport, self.config).await
    }
}

/// The server's capability-assertion table
struct ServerCapabilityGate {
    own: ServerCapabilities,
    client: Arc<StdRwLock<Option<ClientCapabilities>>>,
}

impl ServerCapabilityGate {
    fn client_caps(&self) -> Option<ClientCapabilities> {
        self.client.read().ok().and_then(|c| c.clone())
    }
}

impl CapabilityGate for ServerCapabilityGate {
    fn assert_capability_for_method(&self, method: &str) -> McpResult<()> {
        if method == methods::PING {
            return Ok(());
        }
        let caps = self.client_caps();
        let allowed = match method {
            methods::SAMPLING_CREATE_MESSAGE => {
                caps.as_ref().is_some_and(|c| c.sampling.is_some())
            }
            methods::ROOTS_LIST => caps.as_ref().is_some_and(|c| c.roots.is_some()),
            _ => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(McpError::capability(format!(
                "client does not support {method}"
            )))
        }
    }

    fn assert_notification_capability(&self, method: &str) -> McpResult<()> {
        let allowed = match method {
            methods::LOGGING_MESSAGE => self.own.logging.is_some(),
            methods::RESOURCES_UPDATED | methods::RESOURCES_LIST_CHANGED => {
                self.own.resources.is_some()
            }
            methods::TOOLS_LIST_CHANGED => self.own.tools.is_some(),
            methods::PROMPTS_LIST_CHANGED => self.own.prompts.is_some(),
            _ => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(McpError::capability(format!(
                "server did not advertise the capability backing {method}"
            )))
        }
    }

    fn assert_request_handler_capability(&self, method: &str) -> McpResult<()> {
        let allowed = match method {
            methods::TOOLS_LIST | methods::TOOLS_CALL => self.own.tools.is_some(),
            methods::PROMPTS_LIST | methods::PROMPTS_GET => self.own.prompts.is_some(),
            methods::RESOURCES_LIST
            | methods::RESOURCES_READ
            | methods::RESOURCES_TEMPLATES_LIST => self.own.resources.is_some(),
            methods::RESOURCES_SUBSCRIBE | methods::RESOURCES_UNSUBSCRIBE => self
                .own
                .resources
                .as_ref()
                .is_some_and(|r| r.subscribe.unwrap_or(false)),
            methods::LOGGING_SET_LEVEL => self.own.logging.is_some(),
            methods::COMPLETION_COMPLETE => self.own.completions.is_some(),
            _ => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(McpError::capability(format!(
                "server did not advertise the capability backing {method}"
            )))
        }
    }
}

/// High-level MCP server
#[derive(Clone)]
pub struct McpServer {
    engine: ProtocolEngine,
    config: McpServerConfig,
    client_capabilities: Arc<StdRwLock<Option<ClientCapabilities>>>,
    client_info: Arc<StdRwLock<Option<Implementation>>>,
    negotiated_version: Arc<StdRwLock<Option<String>>>,
    initialized: Arc<AtomicBool>,
}

impl McpServer {
    /// Connect over the given transport builder
    ///
    /// Registers the `initialize` handler and the `initialized`
    /// acknowledgment automatically; everything else is opt-in.
    pub async fn connect<B: TransportBuilder>(
        transport: B,
        config: McpServerConfig,
    ) -> McpResult<Self> {
        let client_capabilities = Arc::new(StdRwLock::new(None));
        let gate = ServerCapabilityGate {
            own: config.capabilities.clone(),
            client: Arc::clone(&client_capabilities),
        };
        let engine = ProtocolEngine::connect(
            transport,
            Box::new(gate),
            EngineOptions {
                enforce_strict_capabilities: config.enforce_strict_capabilities,
            },
        )
        .await?;

        let server = Self {
            engine,
            config,
            client_capabilities,
            client_info: Arc::new(StdRwLock::new(None)),
            negotiated_version: Arc::new(StdRwLock::new(None)),
            initialized: Arc::new(AtomicBool::new(false)),
        };
        server.register_lifecycle_handlers()?;
        Ok(server)
    }

    fn register_lifecycle_handlers(&self) -> McpResult<()> {
        let capabilities = self.config.capabilities.clone();
        let server_info = self.config.server_info.clone();
        let instructions = self.config.instructions.clone();
        let client_capabilities = Arc::clone(&self.client_capabilities);
        let client_info = Arc::clone(&self.client_info);
        let negotiated = Arc::clone(&self.negotiated_version);

        self.engine.set_request_handler(
            move |request: InitializeRequest, _context: RequestHandlerContext| {
                let capabilities = capabilities.clone();
                let server_info = server_info.clone();
                let instructions = instructions.clone();
                let client_capabilities = Arc::clone(&client_capabilities);
                let client_info = Arc::clone(&client_info);
                let negotiated = Arc::clone(&negotiated);
                async move {
                    let version = ProtocolVersion::negotiate(&request.protocol_version);
                    debug!(
                        client = %request.client_info.name,
                        requested = %request.protocol_version,
                        negotiated = %version,
                        "initialize received"
                    );
                    if let Ok(mut slot) = client_capabilities.write() {
                        *slot = Some(request.capabilities);
                    }
                    if let Ok(mut slot) = client_info.write() {
                        *slot = Some(request.client_info);
                    }
                    if let Ok(mut slot) = negotiated.write() {
                        *slot = Some(version.as_str().to_string());
                    }
                    Ok(InitializeResult {
                        protocol_version: version.as_str().to_string(),
                        capabilities,
                        server_info,
                        instructions,
                    })
                }
            },
        )?;

        let initialized = Arc::clone(&self.initialized);
        self.engine.set_notification_handler(
            move |_notification: InitializedNotification, _context| {
                let initialized = Arc::clone(&initialized);
                async move {
                    initialized.store(true, Ordering::SeqCst);
                    debug!("client acknowledged initialization");
                }
            },
        );
        Ok(())
    }

    /// Whether the client has acknowledged initialization
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Capabilities the client declared, once initialize has run
    pub fn client_capabilities(&self) -> Option<ClientCapabilities> {
        self.client_capabilities.read().ok().and_then(|c| c.clone())
    }

    /// Client identity, once initialize has run
    pub fn client_info(&self) -> Option<Implementation> {
        self.client_info.read().ok().and_then(|c| c.clone())
    }

    /// Negotiated protocol version, once initialize has run
    pub fn negotiated_version(&self) -> Option<String> {
        self.negotiated_version.read().ok().and_then(|v| v.clone())
    }

    /// Access the underlying engine (advanced wiring)
    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    fn options(&self) -> RequestOptions {
        RequestOptions::default().with_timeout(self.config.default_timeout)
    }

    // ---- handler registration seams ----

    /// Handle `tools/list`
    pub fn on_list_tools<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(ListToolsRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ListToolsResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Handle `tools/call`
    pub fn on_call_tool<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(CallToolRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<CallToolResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Handle `prompts/list`
    pub fn on_list_prompts<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(ListPromptsRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ListPromptsResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Handle `prompts/get`
    pub fn on_get_prompt<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(GetPromptRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<GetPromptResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Handle `resources/list`
    pub fn on_list_resources<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(ListResourcesRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ListResourcesResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Handle `resources/templates/list`
    pub fn on_list_resource_templates<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(ListResourceTemplatesRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ListResourceTemplatesResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Handle `resources/read`
    pub fn on_read_resource<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(ReadResourceRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ReadResourceResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Handle `resources/subscribe`
    pub fn on_subscribe_resource<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(SubscribeRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<EmptyResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Handle `resources/unsubscribe`
    pub fn on_unsubscribe_resource<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(UnsubscribeRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<EmptyResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Handle `logging/setLevel`
    pub fn on_set_level<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(SetLevelRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<EmptyResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    /// Handle `completion/complete`
    pub fn on_complete<F, Fut>(&self, handler: F) -> McpResult<()>
    where
        F: Fn(CompleteRequest, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<CompleteResult>> + Send + 'static,
    {
        self.engine.set_request_handler(handler)
    }

    // ---- server-initiated operations ----

    /// Connectivity probe
    pub async fn ping(&self) -> McpResult<EmptyResult> {
        self.engine
            .send_request(crate::protocol::messages::PingRequest::default(), self.options())
            .await
    }

    /// Ask the client to run an LLM completion (`sampling/createMessage`)
    pub async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> McpResult<CreateMessageResult> {
        self.engine.send_request(request, self.options()).await
    }

    /// Enumerate the client's filesystem roots (`roots/list`)
    pub async fn list_roots(&self) -> McpResult<ListRootsResult> {
        self.engine
            .send_request(ListRootsRequest::default(), self.options())
            .await
    }

    /// Emit a structured log record toward the client
    pub async fn log_message(
        &self,
        level: LogLevel,
        logger: Option<String>,
        data: Value,
    ) -> McpResult<()> {
        self.engine
            .send_notification(&LoggingMessageNotification {
                level,
                logger,
                data,
            })
            .await
    }

    /// Announce that the tool catalog changed
    pub async fn notify_tools_list_changed(&self) -> McpResult<()> {
        self.engine
            .send_notification(&ToolListChangedNotification::default())
            .await
    }

    /// Announce that the prompt catalog changed
    pub async fn notify_prompts_list_changed(&self) -> McpResult<()> {
        self.engine
            .send_notification(&PromptListChangedNotification::default())
            .await
    }

    /// Announce that the resource catalog changed
    pub async fn notify_resources_list_changed(&self) -> McpResult<()> {
        self.engine
            .send_notification(&ResourceListChangedNotification::default())
            .await
    }

    /// Announce that one subscribed resource changed
    pub async fn notify_resource_updated(&self, uri: impl Into<String>) -> McpResult<()> {
        self.engine
            .send_notification(&ResourceUpdatedNotification { uri: uri.into() })
            .await
    }

    /// Close the connection and drain the engine
    pub async fn close(&self) -> McpResult<()> {
        self.engine.close().await
    }
}
