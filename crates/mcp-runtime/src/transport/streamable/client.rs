//! Streamable HTTP Client Transport
//!
//! Counterpart to the server transport. Every outbound envelope is POSTed
//! to the endpoint; the server answers with either an immediate JSON body
//! or a per-request SSE stream. A standalone GET stream carries
//! server-initiated traffic and reconnects with exponential backoff,
//! presenting the last seen event id for resumption.

// Layer 1: Standard library imports
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use url::Url;

// Layer 3: Internal module imports
use crate::protocol::constants::{defaults, headers as mcp_headers};
use crate::protocol::{
    JsonRpcMessage, JsonRpcMessageTrait, MessageContext, MessageHandler, Transport,
    TransportBuilder, TransportError,
};

/// Token source and authorization hook for the client transport
///
/// The transport attaches the current access token as a bearer header and
/// invokes `redirect_to_authorization` on HTTP 401. It never polls; after
/// the redirect the caller is expected to retry.
#[async_trait]
pub trait OAuthClientProvider: Send + Sync {
    /// Current access token, when one is available
    async fn access_token(&self) -> Option<String>;

    /// Invoked on HTTP 401; kicks off the authorization flow
    async fn redirect_to_authorization(&self) -> Result<(), TransportError>;
}

/// Exponential backoff parameters for SSE reconnection
#[derive(Debug, Clone)]
pub struct ReconnectOptions {
    /// First retry delay
    pub initial_delay: Duration,
    /// Multiplier applied per consecutive failure
    pub grow_factor: f64,
    /// Ceiling on the delay
    pub max_delay: Duration,
    /// Consecutive failures tolerated before the transport closes
    pub max_retries: u32,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            initial_delay: defaults::RECONNECT_INITIAL_DELAY,
            grow_factor: defaults::RECONNECT_GROW_FACTOR,
            max_delay: defaults::RECONNECT_MAX_DELAY,
            max_retries: defaults::RECONNECT_MAX_RETRIES,
        }
    }
}

impl ReconnectOptions {
    /// `delay(n) = min(max_delay, initial_delay * grow_factor^n)`
    pub fn delay(&self, attempt: u32) -> Duration {
        let grown = self.initial_delay.as_secs_f64() * self.grow_factor.powi(attempt as i32);
        Duration::from_secs_f64(grown.min(self.max_delay.as_secs_f64()))
    }
}

struct ClientState {
    http: Client,
    url: Url,
    handler: Arc<dyn MessageHandler>,
    auth: Option<Arc<dyn OAuthClientProvider>>,
    reconnect: ReconnectOptions,
    session_id: StdRwLock<Option<String>>,
    last_event_id: StdRwLock<Option<String>>,
    standalone_running: AtomicBool,
    closed: AtomicBool,
    close_fired: AtomicBool,
}

impl ClientState {
    fn session(&self) -> Option<String> {
        self.session_id.read().ok().and_then(|s| s.clone())
    }

    fn last_event(&self) -> Option<String> {
        self.last_event_id.read().ok().and_then(|s| s.clone())
    }

    fn remember_event(&self, id: &str) {
        if !id.is_empty() {
            if let Ok(mut slot) = self.last_event_id.write() {
                *slot = Some(id.to_string());
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn fire_close(&self) {
        if !self.close_fired.swap(true, Ordering::SeqCst) {
            self.handler.handle_close().await;
        }
    }

    async fn bearer(&self) -> Option<String> {
        match &self.auth {
            Some(provider) => provider.access_token().await,
            None => None,
        }
    }

    /// Capture the server-issued session id from a response
    fn capture_session(&self, response: &reqwest::Response) {
        if let Some(value) = response
            .headers()
            .get(mcp_headers::MCP_SESSION_ID)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut slot) = self.session_id.write() {
                *slot = Some(value.to_string());
            }
        }
    }

    async fn handle_unauthorized(&self) -> TransportError {
        if let Some(provider) = &self.auth {
            if let Err(e) = provider.redirect_to_authorization().await {
                return e;
            }
        }
        TransportError::auth("server returned 401 Unauthorized")
    }

    /// Deliver every envelope found in a JSON response body (single object
    /// or batch array)
    async fn deliver_json(&self, body: &[u8]) {
        let parsed: Result<serde_json::Value, _> = serde_json::from_slice(body);
        let Ok(value) = parsed else {
            self.handler
                .handle_error(TransportError::protocol("malformed JSON response body"))
                .await;
            return;
        };
        let items = match value {
            serde_json::Value::Array(items) => items,
            single => vec![single],
        };
        let context = self.context();
        for item in items {
            match JsonRpcMessage::from_value(item) {
                Ok(message) => {
                    self.handler
                        .handle_message(message, context.clone())
                        .await;
                }
                Err(e) => {
                    self.handler
                        .handle_error(TransportError::protocol(e.to_string()))
                        .await;
                }
            }
        }
    }

    fn context(&self) -> MessageContext {
        match self.session() {
            Some(session) => MessageContext::new(session),
            None => MessageContext::without_session(),
        }
    }

    /// Drain one SSE byte stream, delivering each `data:` envelope and
    /// tracking the last seen `id:`
    async fn read_sse<S, B, E>(&self, stream: S)
    where
        S: Stream<Item = Result<B, E>> + Send,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut events = Box::pin(stream.eventsource());
        while let Some(event) = events.next().await {
            if self.is_closed() {
                return;
            }
            match event {
                Ok(event) => {
                    self.remember_event(&event.id);
                    if event.data.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<serde_json::Value>(&event.data)
                        .map_err(|e| e.to_string())
                        .and_then(|v| {
                            JsonRpcMessage::from_value(v).map_err(|e| e.to_string())
                        }) {
                        Ok(message) => {
                            self.handler
                                .handle_message(message, self.context())
                                .await;
                        }
                        Err(e) => {
                            self.handler
                                .handle_error(TransportError::protocol(format!(
                                    "bad SSE payload: {e}"
                                )))
                                .await;
                        }
                    }
                }
                Err(e) => {
                    trace!(error = %e, "SSE stream interrupted");
                    return;
                }
            }
        }
    }

    /// Issue the standalone GET; `Ok(None)` means the server does not offer
    /// a standalone stream (405)
    async fn open_get(&self) -> Result<Option<reqwest::Response>, TransportError> {
        let mut request = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream");
        if let Some(session) = self.session() {
            request = request.header(mcp_headers::MCP_SESSION_ID, session);
        }
        if let Some(last) = self.last_event() {
            request = request.header(mcp_headers::LAST_EVENT_ID, last);
        }
        if let Some(token) = self.bearer().await {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::connection(e.to_string()))?;
        match response.status() {
            StatusCode::OK => Ok(Some(response)),
            StatusCode::METHOD_NOT_ALLOWED => Ok(None),
            StatusCode::UNAUTHORIZED => Err(self.handle_unauthorized().await),
            status => Err(TransportError::connection(format!(
                "standalone GET failed with status {status}"
            ))),
        }
    }

    /// Standalone stream supervisor: connect, drain, reconnect with
    /// exponential backoff, give up after `max_retries` consecutive
    /// failures
    async fn standalone_loop(self: Arc<Self>) {
        let mut failures: u32 = 0;
        loop {
            if self.is_closed() {
                return;
            }
            match self.open_get().await {
                Ok(Some(response)) => {
                    debug!("standalone SSE stream connected");
                    failures = 0;
                    self.read_sse(response.bytes_stream()).await;
                    if self.is_closed() {
                        return;
                    }
                    debug!("standalone SSE stream dropped, reconnecting");
                }
                Ok(None) => {
                    debug!("server does not offer a standalone stream");
                    self.standalone_running.store(false, Ordering::SeqCst);
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "standalone connect attempt failed");
                }
            }

            if self.is_closed() {
                return;
            }
            if failures >= self.reconnect.max_retries {
                self.handler
                    .handle_error(TransportError::connection(format!(
                        "giving up after {} reconnect attempts",
                        self.reconnect.max_retries
                    )))
                    .await;
                self.closed.store(true, Ordering::SeqCst);
                self.fire_close().await;
                return;
            }
            let delay = self.reconnect.delay(failures);
            failures += 1;
            tokio::time::sleep(delay).await;
        }
    }

    /// Ensure exactly one standalone supervisor is running
    fn ensure_standalone(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.standalone_running.swap(true, Ordering::SeqCst) {
            return None;
        }
        let state = Arc::clone(self);
        Some(tokio::spawn(state.standalone_loop()))
    }
}

/// Streamable HTTP client transport
pub struct StreamableHttpClientTransport {
    state: Arc<ClientState>,
    tasks: Vec<JoinHandle<()>>,
    started: bool,
}

impl StreamableHttpClientTransport {
    /// Open the standalone GET SSE stream (idempotent)
    ///
    /// Typically called right after the `initialized` notification so
    /// server-initiated traffic has somewhere to flow.
    pub fn open_standalone_stream(&mut self) {
        if let Some(task) = self.state.ensure_standalone() {
            self.tasks.push(task);
        }
    }

    /// Issue `DELETE` to terminate the server-side session
    ///
    /// A 405 means the server refuses explicit termination; the session id
    /// is kept in that case.
    pub async fn terminate_session(&mut self) -> Result<(), TransportError> {
        let Some(session) = self.state.session() else {
            return Ok(());
        };
        let mut request = self
            .state
            .http
            .delete(self.state.url.clone())
            .header(mcp_headers::MCP_SESSION_ID, session);
        if let Some(token) = self.state.bearer().await {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::connection(e.to_string()))?;

        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!("server refused session termination, keeping session id");
            return Ok(());
        }
        if let Ok(mut slot) = self.state.session_id.write() {
            *slot = None;
        }
        Ok(())
    }

    /// Last event id seen on any SSE stream, for diagnostics
    pub fn last_event_id(&self) -> Option<String> {
        self.state.last_event()
    }
}

#[async_trait]
impl Transport for StreamableHttpClientTransport {
    async fn start(&mut self) -> Result<(), TransportError> {
        if self.started {
            return Err(TransportError::AlreadyStarted);
        }
        self.started = true;
        Ok(())
    }

    async fn send(&mut self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }
        if self.state.is_closed() {
            return Err(TransportError::Closed);
        }

        let body = message.to_json()?;
        let mut request = self
            .state
            .http
            .post(self.state.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .body(body);
        if let Some(session) = self.state.session() {
            request = request.header(mcp_headers::MCP_SESSION_ID, session);
        }
        if let Some(token) = self.state.bearer().await {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::connection(e.to_string()))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(self.state.handle_unauthorized().await);
        }
        if !response.status().is_success() {
            return Err(TransportError::connection(format!(
                "POST failed with status {}",
                response.status()
            )));
        }

        self.state.capture_session(&response);

        if response.status() == StatusCode::ACCEPTED {
            return Ok(());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("text/event-stream") {
            // Per-request SSE stream: drain it in the background; an
            // interrupted stream falls back to the resumable GET path.
            let state = Arc::clone(&self.state);
            self.tasks.push(tokio::spawn(async move {
                state.read_sse(response.bytes_stream()).await;
                if !state.is_closed() && state.last_event().is_some() {
                    if let Some(task) = state.ensure_standalone() {
                        // Supervisor owns itself from here.
                        drop(task);
                    }
                }
            }));
        } else if content_type.starts_with("application/json") {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| TransportError::connection(e.to_string()))?;
            self.state.deliver_json(&bytes).await;
        } else {
            return Err(TransportError::protocol(format!(
                "unexpected response content-type {content_type:?}"
            )));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.closed.store(true, Ordering::SeqCst);
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.state.fire_close().await;
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        self.state.session()
    }
}

/// Builder for [`StreamableHttpClientTransport`]
pub struct StreamableHttpClientTransportBuilder {
    url: Url,
    auth: Option<Arc<dyn OAuthClientProvider>>,
    reconnect: ReconnectOptions,
    request_timeout: Option<Duration>,
    handler: Option<Arc<dyn MessageHandler>>,
}

impl StreamableHttpClientTransportBuilder {
    /// Create a builder targeting the server's `/mcp` endpoint
    pub fn new(url: Url) -> Self {
        Self {
            url,
            auth: None,
            reconnect: ReconnectOptions::default(),
            request_timeout: None,
            handler: None,
        }
    }

    /// Attach an auth provider
    pub fn with_auth(mut self, auth: Arc<dyn OAuthClientProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Override the reconnect backoff parameters
    pub fn with_reconnect_options(mut self, reconnect: ReconnectOptions) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Per-request HTTP timeout (connect + headers; SSE bodies stream
    /// beyond it)
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

impl TransportBuilder for StreamableHttpClientTransportBuilder {
    type Transport = StreamableHttpClientTransport;

    fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    async fn build(self) -> Result<StreamableHttpClientTransport, TransportError> {
        let handler = self
            .handler
            .ok_or_else(|| TransportError::other("message handler not configured"))?;

        let mut http = Client::builder();
        if let Some(timeout) = self.request_timeout {
            http = http.connect_timeout(timeout);
        }
        let http = http
            .build()
            .map_err(|e| TransportError::other(format!("http client construction failed: {e}")))?;

        Ok(StreamableHttpClientTransport {
            state: Arc::new(ClientState {
                http,
                url: self.url,
                handler,
                auth: self.auth,
                reconnect: self.reconnect,
                session_id: StdRwLock::new(None),
                last_event_id: StdRwLock::new(None),
                standalone_running: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                close_fired: AtomicBool::new(false),
            }),
            tasks: Vec::new(),
            started: false,
        })
    }
}
