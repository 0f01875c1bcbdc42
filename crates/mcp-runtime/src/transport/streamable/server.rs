//! Streamable HTTP Server Transport
//!
//! One `/mcp` endpoint accepting POST, GET, DELETE, and OPTIONS. Several
//! streams coexist per session:
//!
//! - the standalone GET SSE stream (reserved stream id 0) carrying
//!   server-initiated traffic,
//! - one stream per POST that contained requests, answered either over SSE
//!   (default) or as a buffered JSON body (`enable_json_response`),
//! - replay streams driven by the event store when a client reconnects with
//!   `Last-Event-ID`.
//!
//! The engine never reaches into transport state: responses come back
//! through `send`, and the transport routes them to the stream that carried
//! the originating request.

// Layer 1: Standard library imports
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::{Json, Router};
use dashmap::DashMap;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::{debug, trace, warn};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::event_store::{EventId, EventStore, StreamId};
use crate::protocol::constants::{defaults, error_codes, headers as mcp_headers, methods};
use crate::protocol::{
    JsonRpcMessage, JsonRpcMessageTrait, MessageContext, MessageHandler, RequestId, Transport,
    TransportBuilder, TransportError,
};

/// Reserved id of the standalone GET SSE stream
pub const STANDALONE_STREAM_ID: StreamId = 0;

/// Callback invoked once when the session is established
pub type SessionInitializedCallback = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Generator for session ids; `None` puts the transport in stateless mode
pub type SessionIdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Configuration for [`StreamableHttpServerTransport`]
#[derive(Clone)]
pub struct StreamableHttpServerConfig {
    /// Address to bind when `start()` should run its own server; `None`
    /// means the caller mounts [`StreamableHttpServerTransport::router`]
    /// into an existing axum app
    pub bind_addr: Option<SocketAddr>,

    /// Endpoint path
    pub path: String,

    /// Session id source; `None` selects stateless mode
    pub session_id_generator: Option<SessionIdGenerator>,

    /// Answer POSTed requests with a buffered JSON body instead of SSE
    pub enable_json_response: bool,

    /// Interval between SSE keep-alive comments
    pub keep_alive: Duration,

    /// Event store enabling Last-Event-ID replay
    pub event_store: Option<Arc<dyn EventStore>>,
}

impl Default for StreamableHttpServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: None,
            path: "/mcp".to_string(),
            session_id_generator: Some(Arc::new(|| Uuid::new_v4().to_string())),
            enable_json_response: false,
            keep_alive: defaults::SSE_KEEP_ALIVE,
            event_store: None,
        }
    }
}

impl std::fmt::Debug for StreamableHttpServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamableHttpServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("path", &self.path)
            .field("stateful", &self.session_id_generator.is_some())
            .field("enable_json_response", &self.enable_json_response)
            .field("event_store", &self.event_store.is_some())
            .finish()
    }
}

/// One SSE frame queued toward an HTTP response
#[derive(Debug, Clone)]
struct SseFrame {
    event_id: Option<EventId>,
    message: JsonRpcMessage,
}

/// Where a stream's output goes
enum StreamHandle {
    /// Live SSE channel
    Sse(mpsc::UnboundedSender<SseFrame>),
    /// JSON mode: responses buffer up until every request is answered
    Json(JsonCollector),
}

struct JsonCollector {
    collected: Vec<JsonRpcMessage>,
    done: Option<oneshot::Sender<Vec<JsonRpcMessage>>>,
}

struct ServerState {
    config: StreamableHttpServerConfig,
    handler: Arc<dyn MessageHandler>,
    session_id: RwLock<Option<String>>,
    initialized: AtomicBool,
    streams: DashMap<StreamId, StreamHandle>,
    request_to_stream: DashMap<RequestId, StreamId>,
    pending: DashMap<StreamId, usize>,
    next_stream_id: AtomicU64,
    on_session_initialized: RwLock<Option<SessionInitializedCallback>>,
    close_fired: AtomicBool,
    closed: AtomicBool,
}

impl ServerState {
    fn stateful(&self) -> bool {
        self.config.session_id_generator.is_some()
    }

    fn current_session(&self) -> Option<String> {
        self.session_id.read().ok().and_then(|s| s.clone())
    }

    /// Allocate the next per-request stream id (0 is reserved)
    fn allocate_stream_id(&self) -> StreamId {
        self.next_stream_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn fire_close(&self) {
        if !self.close_fired.swap(true, Ordering::SeqCst) {
            self.handler.handle_close().await;
        }
    }

    /// Tear down every stream and map; used by DELETE and `close()`
    async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.streams.clear();
        self.request_to_stream.clear();
        self.pending.clear();
        self.fire_close().await;
    }

    /// Route an outbound envelope to the right stream
    async fn route_message(
        &self,
        message: &JsonRpcMessage,
        context: Option<&MessageContext>,
    ) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        match message {
            JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => {
                let Some(id) = message.id().cloned() else {
                    // Unattributed error: best-effort standalone delivery.
                    self.deliver_standalone(message).await;
                    return Ok(());
                };
                let Some(stream_id) = self.request_to_stream.get(&id).map(|e| *e.value()) else {
                    warn!(%id, "response for unknown request id dropped");
                    return Ok(());
                };
                self.deliver_response(stream_id, &id, message).await;
                Ok(())
            }
            JsonRpcMessage::Notification(_) => {
                let related = context.and_then(|c| c.related_request_id());
                match related.and_then(|id| self.request_to_stream.get(id).map(|e| *e.value())) {
                    Some(stream_id) if self.is_sse_stream(stream_id) => {
                        self.deliver_sse(stream_id, message).await;
                    }
                    // Unrelated (or JSON-mode related) notifications fall
                    // through to the standalone stream; "MAY send" allows a
                    // silent drop when it is not open.
                    _ => self.deliver_standalone(message).await,
                }
                Ok(())
            }
            JsonRpcMessage::Request(request) => {
                if self.streams.contains_key(&STANDALONE_STREAM_ID) {
                    self.deliver_sse(STANDALONE_STREAM_ID, message).await;
                    Ok(())
                } else {
                    Err(TransportError::connection(format!(
                        "no standalone stream open for server-initiated {}",
                        request.method
                    )))
                }
            }
        }
    }

    fn is_sse_stream(&self, stream_id: StreamId) -> bool {
        matches!(
            self.streams.get(&stream_id).as_deref(),
            Some(StreamHandle::Sse(_))
        )
    }

    async fn deliver_standalone(&self, message: &JsonRpcMessage) {
        if self.streams.contains_key(&STANDALONE_STREAM_ID) {
            self.deliver_sse(STANDALONE_STREAM_ID, message).await;
        } else {
            trace!(method = ?message.method(), "standalone stream not open, dropping");
        }
    }

    /// Write one frame onto an SSE stream, recording it first when an event
    /// store is configured
    async fn deliver_sse(&self, stream_id: StreamId, message: &JsonRpcMessage) {
        let sender = match self.streams.get(&stream_id).as_deref() {
            Some(StreamHandle::Sse(sender)) => sender.clone(),
            _ => return,
        };

        let event_id = match &self.config.event_store {
            Some(store) => match store.store_event(stream_id, message.clone()).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(error = %e, "event store write failed, frame sent without id");
                    None
                }
            },
            None => None,
        };

        if sender
            .send(SseFrame {
                event_id,
                message: message.clone(),
            })
            .is_err()
        {
            // Client went away; per-request streams are cleaned up here,
            // the standalone stream slot is freed for a future GET.
            debug!(stream_id, "SSE client disconnected, dropping stream");
            self.streams.remove(&stream_id);
        }
    }

    async fn deliver_response(&self, stream_id: StreamId, id: &RequestId, message: &JsonRpcMessage) {
        // Json collectors are appended under the entry lock; SSE delivery
        // happens after the guard drops because it awaits the event store.
        let buffered_json = {
            match self.streams.get_mut(&stream_id).as_deref_mut() {
                Some(StreamHandle::Json(collector)) => {
                    collector.collected.push(message.clone());
                    true
                }
                Some(StreamHandle::Sse(_)) => false,
                None => {
                    trace!(stream_id, "stream gone before response arrived");
                    false
                }
            }
        };
        if !buffered_json {
            self.deliver_sse(stream_id, message).await;
        }

        self.request_to_stream.remove(id);

        let remaining = match self.pending.get_mut(&stream_id) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };

        if remaining == 0 {
            self.pending.remove(&stream_id);
            // JSON mode closes the HTTP body once every multiplexed request
            // is answered; SSE mode leaves the socket open for
            // server-initiated traffic.
            if matches!(
                self.streams.get(&stream_id).as_deref(),
                Some(StreamHandle::Json(_))
            ) {
                if let Some((_, StreamHandle::Json(mut collector))) =
                    self.streams.remove(&stream_id)
                {
                    if let Some(done) = collector.done.take() {
                        let _ = done.send(collector.collected);
                    }
                }
            }
        }
    }
}

/// Streamable HTTP server transport
///
/// Built pre-configured with the engine as its handler; exposes an axum
/// [`Router`] (or binds its own listener when configured with an address).
pub struct StreamableHttpServerTransport {
    state: Arc<ServerState>,
    serve_task: Option<JoinHandle<()>>,
    started: bool,
}

fn build_router(state: &Arc<ServerState>) -> Router {
    let method_router: MethodRouter<Arc<ServerState>> = axum::routing::post(handle_post)
        .get(handle_get)
        .delete(handle_delete)
        .options(handle_options);
    Router::new()
        .route(&state.config.path, method_router)
        .layer(CorsLayer::permissive())
        .with_state(Arc::clone(state))
}

impl StreamableHttpServerTransport {
    /// Register a callback for the moment the session is established
    pub fn set_session_initialized_callback(&self, callback: SessionInitializedCallback) {
        if let Ok(mut slot) = self.state.on_session_initialized.write() {
            *slot = Some(callback);
        }
    }

    /// Axum router serving the configured endpoint path
    pub fn router(&self) -> Router {
        build_router(&self.state)
    }

    #[cfg(test)]
    fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }
}

/// Handle to a transport that was consumed by the protocol engine
///
/// The engine owns the transport after `connect`; this handle, taken from
/// the builder beforehand, is how the surrounding application mounts the
/// endpoint into its axum app and reads the session id.
#[derive(Clone, Default)]
pub struct StreamableHttpServerHandle {
    state: Arc<std::sync::OnceLock<Arc<ServerState>>>,
}

impl StreamableHttpServerHandle {
    /// Axum router for the endpoint; `None` until the transport is built
    pub fn router(&self) -> Option<Router> {
        self.state.get().map(build_router)
    }

    /// Current session id, once a session is established
    pub fn session_id(&self) -> Option<String> {
        self.state.get().and_then(|s| s.current_session())
    }
}

#[async_trait]
impl Transport for StreamableHttpServerTransport {
    async fn start(&mut self) -> Result<(), TransportError> {
        if self.started {
            return Err(TransportError::AlreadyStarted);
        }
        self.started = true;

        if let Some(addr) = self.state.config.bind_addr {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            let router = self.router();
            debug!(%addr, "streamable http server listening");
            self.serve_task = Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router).await {
                    warn!(error = %e, "streamable http server stopped");
                }
            }));
        }
        Ok(())
    }

    async fn send(&mut self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }
        self.state.route_message(message, None).await
    }

    async fn send_with_context(
        &mut self,
        message: &JsonRpcMessage,
        context: &MessageContext,
    ) -> Result<(), TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }
        self.state.route_message(message, Some(context)).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.serve_task.take() {
            task.abort();
        }
        self.state.shutdown().await;
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        self.state.current_session()
    }
}

/// Builder for [`StreamableHttpServerTransport`]
#[derive(Default)]
pub struct StreamableHttpServerTransportBuilder {
    config: Option<StreamableHttpServerConfig>,
    handler: Option<Arc<dyn MessageHandler>>,
    handle: StreamableHttpServerHandle,
}

impl StreamableHttpServerTransportBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: StreamableHttpServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Handle for mounting the endpoint after the engine takes the transport
    pub fn handle(&self) -> StreamableHttpServerHandle {
        self.handle.clone()
    }
}

impl TransportBuilder for StreamableHttpServerTransportBuilder {
    type Transport = StreamableHttpServerTransport;

    fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    async fn build(self) -> Result<StreamableHttpServerTransport, TransportError> {
        let handler = self
            .handler
            .ok_or_else(|| TransportError::other("message handler not configured"))?;
        let config = self.config.unwrap_or_default();
        let state = Arc::new(ServerState {
            config,
            handler,
            session_id: RwLock::new(None),
            initialized: AtomicBool::new(false),
            streams: DashMap::new(),
            request_to_stream: DashMap::new(),
            pending: DashMap::new(),
            next_stream_id: AtomicU64::new(STANDALONE_STREAM_ID + 1),
            on_session_initialized: RwLock::new(None),
            close_fired: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });
        let _ = self.handle.state.set(Arc::clone(&state));
        Ok(StreamableHttpServerTransport {
            state,
            serve_task: None,
            started: false,
        })
    }
}

// ================================================================
// HTTP handlers
// ================================================================

fn jsonrpc_error_body(code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {"code": code, "message": message},
        "id": null
    })
}

fn error_response(status: StatusCode, code: i32, message: &str) -> Response {
    (status, Json(jsonrpc_error_body(code, message))).into_response()
}

fn accept_includes(headers: &HeaderMap, content_type: &str) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains(content_type) || v.contains("*/*"))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Validate the session header for non-initialize traffic in stateful mode:
/// 400 when missing, 404 when it does not match.
fn check_session(state: &ServerState, headers: &HeaderMap) -> Result<(), Response> {
    if !state.stateful() {
        return Ok(());
    }
    let presented = header_value(headers, mcp_headers::MCP_SESSION_ID);
    let current = state.current_session();
    match (presented, current) {
        (Some(presented), Some(current)) if presented == current => Ok(()),
        (Some(_), _) => Err(error_response(
            StatusCode::NOT_FOUND,
            error_codes::CONNECTION_CLOSED,
            "Session not found",
        )),
        (None, _) => Err(error_response(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_REQUEST,
            "Bad Request: Mcp-Session-Id header is required",
        )),
    }
}

fn with_session_header(state: &ServerState, mut response: Response) -> Response {
    if let Some(session) = state.current_session() {
        if let Ok(value) = session.parse() {
            response
                .headers_mut()
                .insert(mcp_headers::MCP_SESSION_ID, value);
        }
    }
    response
}

fn sse_response(
    state: &ServerState,
    rx: mpsc::UnboundedReceiver<SseFrame>,
) -> Response {
    let stream = UnboundedReceiverStream::new(rx).map(|frame| {
        let mut event = Event::default().event("message");
        if let Some(id) = frame.event_id {
            event = event.id(id);
        }
        match frame.message.to_json() {
            Ok(data) => Ok::<Event, Infallible>(event.data(data)),
            Err(_) => Ok(Event::default().comment("encode error")),
        }
    });
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(state.config.keep_alive)
                .text("keep-alive"),
        )
        .into_response()
}

/// POST `/mcp`: client-to-server envelopes
async fn handle_post(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Acceptance rules come first, before the body is even parsed.
    if !accept_includes(&headers, "application/json")
        || !accept_includes(&headers, "text/event-stream")
    {
        return error_response(
            StatusCode::NOT_ACCEPTABLE,
            error_codes::CONNECTION_CLOSED,
            "Not Acceptable: Client must accept both application/json and text/event-stream",
        );
    }
    let content_type = header_value(&headers, header::CONTENT_TYPE.as_str()).unwrap_or_default();
    if !content_type.starts_with("application/json") {
        return error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            error_codes::CONNECTION_CLOSED,
            "Unsupported Media Type: Content-Type must be application/json",
        );
    }

    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                error_codes::PARSE_ERROR,
                &format!("Parse error: {e}"),
            )
        }
    };
    let raw_batch = match parsed {
        Value::Array(items) => items,
        single => vec![single],
    };
    let mut messages = Vec::with_capacity(raw_batch.len());
    for raw in raw_batch {
        match JsonRpcMessage::from_value(raw) {
            Ok(message) => messages.push(message),
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    error_codes::PARSE_ERROR,
                    &e.to_string(),
                )
            }
        }
    }
    if messages.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_REQUEST,
            "Invalid Request: empty batch",
        );
    }

    let init_count = messages
        .iter()
        .filter(|m| {
            matches!(m, JsonRpcMessage::Request(r) if r.method == methods::INITIALIZE)
        })
        .count();

    if init_count > 1 {
        return error_response(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_REQUEST,
            "Invalid Request: Only one initialization request is allowed",
        );
    }

    if init_count == 1 {
        if state.initialized.load(Ordering::SeqCst) {
            return error_response(
                StatusCode::BAD_REQUEST,
                error_codes::INVALID_REQUEST,
                "Invalid Request: Server already initialized",
            );
        }
        if messages.len() > 1 {
            return error_response(
                StatusCode::BAD_REQUEST,
                error_codes::INVALID_REQUEST,
                "Invalid Request: Initialization must be sent alone",
            );
        }
        if header_value(&headers, mcp_headers::MCP_SESSION_ID).is_some() {
            return error_response(
                StatusCode::BAD_REQUEST,
                error_codes::INVALID_REQUEST,
                "Invalid Request: Initialization must not carry a session id",
            );
        }

        let session = state
            .config
            .session_id_generator
            .as_ref()
            .map(|generate| generate());
        if let Ok(mut slot) = state.session_id.write() {
            slot.clone_from(&session);
        }
        state.initialized.store(true, Ordering::SeqCst);
        if let Ok(slot) = state.on_session_initialized.read() {
            if let Some(callback) = slot.as_ref() {
                callback(session.as_deref());
            }
        }
        debug!(session = ?session, "session initialized");
    } else {
        if state.stateful() && !state.initialized.load(Ordering::SeqCst) {
            return error_response(
                StatusCode::BAD_REQUEST,
                error_codes::INVALID_REQUEST,
                "Bad Request: Server not initialized",
            );
        }
        if let Err(response) = check_session(&state, &headers) {
            return response;
        }
    }

    let context = match state.current_session() {
        Some(session) => MessageContext::new(session),
        None => MessageContext::without_session(),
    };

    let request_ids: Vec<RequestId> = messages
        .iter()
        .filter_map(|m| match m {
            JsonRpcMessage::Request(r) => Some(r.id.clone()),
            _ => None,
        })
        .collect();

    // Responses and notifications only: dispatch and acknowledge.
    if request_ids.is_empty() {
        for message in messages {
            state.handler.handle_message(message, context.clone()).await;
        }
        return with_session_header(&state, StatusCode::ACCEPTED.into_response());
    }

    // Requests present: reserve a stream before dispatching so responses
    // have somewhere to land.
    let stream_id = state.allocate_stream_id();
    for id in &request_ids {
        state.request_to_stream.insert(id.clone(), stream_id);
    }
    state.pending.insert(stream_id, request_ids.len());

    if state.config.enable_json_response {
        let (done_tx, done_rx) = oneshot::channel();
        state.streams.insert(
            stream_id,
            StreamHandle::Json(JsonCollector {
                collected: Vec::new(),
                done: Some(done_tx),
            }),
        );

        for message in messages {
            state.handler.handle_message(message, context.clone()).await;
        }

        match done_rx.await {
            Ok(mut collected) => {
                let body = if collected.len() == 1 {
                    serde_json::to_value(collected.remove(0))
                } else {
                    serde_json::to_value(collected)
                };
                match body {
                    Ok(body) => with_session_header(&state, Json(body).into_response()),
                    Err(_) => error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        error_codes::INTERNAL_ERROR,
                        "Internal error: response encoding failed",
                    ),
                }
            }
            Err(_) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                "Internal error: transport closed before responses completed",
            ),
        }
    } else {
        // SSE headers go out now; handler errors become error frames on the
        // stream rather than a JSON status downgrade.
        let (tx, rx) = mpsc::unbounded_channel();
        state.streams.insert(stream_id, StreamHandle::Sse(tx));

        for message in messages {
            state.handler.handle_message(message, context.clone()).await;
        }

        with_session_header(&state, sse_response(&state, rx))
    }
}

/// GET `/mcp`: the standalone SSE stream, or a replay stream when
/// `Last-Event-ID` is presented
async fn handle_get(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if !accept_includes(&headers, "text/event-stream") {
        return error_response(
            StatusCode::NOT_ACCEPTABLE,
            error_codes::CONNECTION_CLOSED,
            "Not Acceptable: Client must accept text/event-stream",
        );
    }
    if state.initialized.load(Ordering::SeqCst) {
        if let Err(response) = check_session(&state, &headers) {
            return response;
        }
    }

    // Resumption path: replay everything after the presented event id and
    // make the new channel the live stream for that stream id.
    if let (Some(last_event_id), Some(store)) = (
        header_value(&headers, mcp_headers::LAST_EVENT_ID),
        state.config.event_store.clone(),
    ) {
        let (replay_tx, mut replay_rx) = mpsc::unbounded_channel();
        let stream_id = match store
            .replay_events_after(last_event_id.to_string(), replay_tx)
            .await
        {
            Ok(stream_id) => stream_id,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    error_codes::INVALID_REQUEST,
                    &e.to_string(),
                )
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        while let Ok((event_id, message)) = replay_rx.try_recv() {
            let _ = tx.send(SseFrame {
                event_id: Some(event_id),
                message,
            });
        }
        state.streams.insert(stream_id, StreamHandle::Sse(tx));
        debug!(stream_id, last_event_id, "replay stream attached");
        return with_session_header(&state, sse_response(&state, rx));
    }

    // Standalone stream: at most one per session.
    let stale = match state.streams.get(&STANDALONE_STREAM_ID).as_deref() {
        Some(StreamHandle::Sse(sender)) => sender.is_closed(),
        Some(StreamHandle::Json(_)) => true,
        None => true,
    };
    if !stale {
        return error_response(
            StatusCode::CONFLICT,
            error_codes::CONNECTION_CLOSED,
            "Conflict: Only one SSE stream is allowed per session",
        );
    }

    let (tx, rx) = mpsc::unbounded_channel();
    state
        .streams
        .insert(STANDALONE_STREAM_ID, StreamHandle::Sse(tx));
    with_session_header(&state, sse_response(&state, rx))
}

/// DELETE `/mcp`: session termination
async fn handle_delete(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if let Err(response) = check_session(&state, &headers) {
        return response;
    }
    state.shutdown().await;
    StatusCode::OK.into_response()
}

/// OPTIONS `/mcp`
async fn handle_options(State(_state): State<Arc<ServerState>>) -> Response {
    StatusCode::OK.into_response()
}
