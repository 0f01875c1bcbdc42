//! Legacy SSE Server Transport
//!
//! `GET /sse` opens the event stream: the first frame is an `endpoint`
//! event telling the client where to POST, every later frame is a
//! `message` event. `POST /messages?sessionId=…` carries client-to-server
//! envelopes and returns 202 on acceptance.

// Layer 1: Standard library imports
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

// Layer 3: Internal module imports
use crate::protocol::constants::{defaults, error_codes};
use crate::protocol::{
    JsonRpcMessage, JsonRpcMessageTrait, MessageContext, MessageHandler, Transport,
    TransportBuilder, TransportError,
};

/// Configuration for [`SseServerTransport`]
#[derive(Debug, Clone)]
pub struct SseServerConfig {
    /// Address to bind when `start()` should run its own server
    pub bind_addr: Option<SocketAddr>,
    /// Event stream endpoint
    pub sse_path: String,
    /// Message submission endpoint
    pub messages_path: String,
    /// Interval between SSE keep-alive comments
    pub keep_alive: Duration,
    /// POST body size cap
    pub max_body_bytes: usize,
}

impl Default for SseServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: None,
            sse_path: "/sse".to_string(),
            messages_path: "/messages".to_string(),
            keep_alive: defaults::SSE_KEEP_ALIVE,
            max_body_bytes: defaults::SSE_MAX_BODY_BYTES,
        }
    }
}

struct SseState {
    config: SseServerConfig,
    handler: Arc<dyn MessageHandler>,
    session_id: StdRwLock<Option<String>>,
    outbound: StdRwLock<Option<mpsc::UnboundedSender<JsonRpcMessage>>>,
    close_fired: AtomicBool,
    closed: AtomicBool,
}

impl SseState {
    fn current_session(&self) -> Option<String> {
        self.session_id.read().ok().and_then(|s| s.clone())
    }

    fn live_sender(&self) -> Option<mpsc::UnboundedSender<JsonRpcMessage>> {
        self.outbound
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .filter(|sender| !sender.is_closed())
    }

    async fn fire_close(&self) {
        if !self.close_fired.swap(true, Ordering::SeqCst) {
            self.handler.handle_close().await;
        }
    }
}

/// Legacy SSE server transport (one live event stream at a time)
pub struct SseServerTransport {
    state: Arc<SseState>,
    serve_task: Option<JoinHandle<()>>,
    started: bool,
}

impl SseServerTransport {
    /// Axum router serving the SSE and messages endpoints
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.state.config.sse_path, axum::routing::get(handle_sse))
            .route(
                &self.state.config.messages_path,
                axum::routing::post(handle_messages),
            )
            .with_state(Arc::clone(&self.state))
    }

    #[cfg(test)]
    fn state(&self) -> Arc<SseState> {
        Arc::clone(&self.state)
    }
}

#[async_trait]
impl Transport for SseServerTransport {
    async fn start(&mut self) -> Result<(), TransportError> {
        if self.started {
            return Err(TransportError::AlreadyStarted);
        }
        self.started = true;

        if let Some(addr) = self.state.config.bind_addr {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            let router = self.router();
            debug!(%addr, "legacy SSE server listening");
            self.serve_task = Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router).await {
                    warn!(error = %e, "legacy SSE server stopped");
                }
            }));
        }
        Ok(())
    }

    async fn send(&mut self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let sender = self
            .state
            .live_sender()
            .ok_or_else(|| TransportError::connection("no SSE client connected"))?;
        sender
            .send(message.clone())
            .map_err(|_| TransportError::connection("SSE client disconnected"))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.serve_task.take() {
            task.abort();
        }
        self.state.closed.store(true, Ordering::SeqCst);
        if let Ok(mut slot) = self.state.outbound.write() {
            *slot = None;
        }
        self.state.fire_close().await;
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        self.state.current_session()
    }
}

/// Builder for [`SseServerTransport`]
#[derive(Default)]
pub struct SseServerTransportBuilder {
    config: Option<SseServerConfig>,
    handler: Option<Arc<dyn MessageHandler>>,
}

impl SseServerTransportBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: SseServerConfig) -> Self {
        self.config = Some(config);
        self
    }
}

impl TransportBuilder for SseServerTransportBuilder {
    type Transport = SseServerTransport;

    fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    async fn build(self) -> Result<SseServerTransport, TransportError> {
        let handler = self
            .handler
            .ok_or_else(|| TransportError::other("message handler not configured"))?;
        Ok(SseServerTransport {
            state: Arc::new(SseState {
                config: self.config.unwrap_or_default(),
                handler,
                session_id: StdRwLock::new(None),
                outbound: StdRwLock::new(None),
                close_fired: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
            serve_task: None,
            started: false,
        })
    }
}

// ================================================================
// HTTP handlers
// ================================================================

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

fn error_body(status: StatusCode, code: i32, message: &str) -> Response {
    (
        status,
        Json(json!({
            "jsonrpc": "2.0",
            "error": {"code": code, "message": message},
            "id": null
        })),
    )
        .into_response()
}

/// `GET /sse`: establish the event stream
async fn handle_sse(State(state): State<Arc<SseState>>) -> Response {
    if state.live_sender().is_some() {
        return error_body(
            StatusCode::CONFLICT,
            error_codes::CONNECTION_CLOSED,
            "Conflict: an SSE stream is already connected",
        );
    }

    let session_id = Uuid::new_v4().to_string();
    if let Ok(mut slot) = state.session_id.write() {
        *slot = Some(session_id.clone());
    }

    let (tx, rx) = mpsc::unbounded_channel();
    if let Ok(mut slot) = state.outbound.write() {
        *slot = Some(tx);
    }
    debug!(%session_id, "SSE client connected");

    let endpoint = format!("{}?sessionId={}", state.config.messages_path, session_id);
    let bootstrap = futures::stream::once(async move {
        Ok::<Event, Infallible>(Event::default().event("endpoint").data(endpoint))
    });
    let messages = UnboundedReceiverStream::new(rx).map(|message| {
        let event = Event::default().event("message");
        match message.to_json() {
            Ok(data) => Ok::<Event, Infallible>(event.data(data)),
            Err(_) => Ok(Event::default().comment("encode error")),
        }
    });

    Sse::new(bootstrap.chain(messages))
        .keep_alive(
            KeepAlive::new()
                .interval(state.config.keep_alive)
                .text("keep-alive"),
        )
        .into_response()
}

/// `POST /messages?sessionId=…`: client-to-server envelopes
async fn handle_messages(
    State(state): State<Arc<SseState>>,
    Query(query): Query<MessagesQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let current = state.current_session();
    if query.session_id.is_none() || query.session_id != current {
        return error_body(
            StatusCode::NOT_FOUND,
            error_codes::CONNECTION_CLOSED,
            "Session not found",
        );
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("application/json") {
        return error_body(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            error_codes::CONNECTION_CLOSED,
            "Unsupported Media Type: Content-Type must be application/json",
        );
    }
    if body.len() > state.config.max_body_bytes {
        return error_body(
            StatusCode::PAYLOAD_TOO_LARGE,
            error_codes::INVALID_REQUEST,
            "Payload Too Large",
        );
    }

    let message = match serde_json::from_slice::<serde_json::Value>(&body)
        .map_err(|e| e.to_string())
        .and_then(|v| JsonRpcMessage::from_value(v).map_err(|e| e.to_string()))
    {
        Ok(message) => message,
        Err(e) => {
            return error_body(
                StatusCode::BAD_REQUEST,
                error_codes::PARSE_ERROR,
                &format!("Parse error: {e}"),
            )
        }
    };

    let context = match current {
        Some(session) => MessageContext::new(session),
        None => MessageContext::without_session(),
    };
    state.handler.handle_message(message, context).await;

    (StatusCode::ACCEPTED, "Accepted").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JsonRpcRequest;
    use std::sync::Mutex as StdMutex;
    use tokio::time::timeout;

    struct RecordingHandler {
        messages: StdMutex<Vec<JsonRpcMessage>>,
        sessions: StdMutex<Vec<Option<String>>>,
    }

    impl RecordingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: StdMutex::new(Vec::new()),
                sessions: StdMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle_message(&self, message: JsonRpcMessage, context: MessageContext) {
            self.messages.lock().unwrap().push(message);
            self.sessions
                .lock()
                .unwrap()
                .push(context.session_id().map(String::from));
        }
        async fn handle_error(&self, _error: TransportError) {}
        async fn handle_close(&self) {}
    }

    async fn build() -> (SseServerTransport, Arc<RecordingHandler>) {
        let handler = RecordingHandler::new();
        let mut transport = SseServerTransportBuilder::new()
            .with_message_handler(handler.clone() as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        transport.start().await.unwrap();
        (transport, handler)
    }

    async fn read_until(response: Response, needle: &str) -> String {
        let mut collected = String::new();
        let mut stream = response.into_body().into_data_stream();
        loop {
            let chunk = timeout(Duration::from_secs(2), stream.next())
                .await
                .expect("timed out waiting for SSE data")
                .expect("stream ended early")
                .expect("body error");
            collected.push_str(std::str::from_utf8(&chunk).unwrap());
            if collected.contains(needle) {
                return collected;
            }
        }
    }

    #[tokio::test]
    async fn get_bootstraps_with_endpoint_event() {
        let (transport, _handler) = build().await;
        let response = handle_sse(State(transport.state())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let session = transport.session_id().unwrap();
        let text = read_until(response, "event: endpoint").await;
        assert!(text.contains(&format!("/messages?sessionId={session}")));
    }

    #[tokio::test]
    async fn post_delivers_and_returns_202() {
        let (mut transport, handler) = build().await;
        let sse = handle_sse(State(transport.state())).await;
        let session = transport.session_id().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let body = Bytes::from(json!({"jsonrpc":"2.0","id":1,"method":"ping"}).to_string());
        let response = handle_messages(
            State(transport.state()),
            Query(MessagesQuery {
                session_id: Some(session.clone()),
            }),
            headers,
            body,
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(handler.messages.lock().unwrap().len(), 1);
        assert_eq!(
            handler.sessions.lock().unwrap()[0],
            Some(session.clone())
        );

        // Server-to-client traffic rides the stream as message events.
        transport
            .send(&JsonRpcMessage::Request(JsonRpcRequest::new(
                "roots/list",
                None,
                1,
            )))
            .await
            .unwrap();
        let text = read_until(sse, "event: message").await;
        assert!(text.contains("roots/list"));
    }

    #[tokio::test]
    async fn post_with_wrong_session_is_404() {
        let (transport, _handler) = build().await;
        let _sse = handle_sse(State(transport.state())).await;

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let response = handle_messages(
            State(transport.state()),
            Query(MessagesQuery {
                session_id: Some("wrong".to_string()),
            }),
            headers,
            Bytes::from_static(b"{}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_content_type_and_size_are_enforced() {
        let (transport, _handler) = build().await;
        let _sse = handle_sse(State(transport.state())).await;
        let session = transport.session_id();

        let mut plain = HeaderMap::new();
        plain.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        let response = handle_messages(
            State(transport.state()),
            Query(MessagesQuery {
                session_id: session.clone(),
            }),
            plain,
            Bytes::from_static(b"{}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        // 4 MiB cap.
        let mut json_headers = HeaderMap::new();
        json_headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let oversized = Bytes::from(vec![b' '; defaults::SSE_MAX_BODY_BYTES + 1]);
        let response = handle_messages(
            State(transport.state()),
            Query(MessagesQuery {
                session_id: session.clone(),
            }),
            json_headers.clone(),
            oversized,
        )
        .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let response = handle_messages(
            State(transport.state()),
            Query(MessagesQuery { session_id: session }),
            json_headers,
            Bytes::from_static(b"{broken"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
