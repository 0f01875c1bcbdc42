//! The Protocol Engine
//!
//! Bidirectional JSON-RPC correlation over one transport. Outbound request
//! ids come from a monotonic counter scoped to the engine instance; each
//! outstanding request owns a oneshot completion slot, an optional progress
//! callback, and a timer task. Inbound requests run in their own task with a
//! cancellation token the peer can trigger through
//! `notifications/cancelled`.
//!
//! Outbound writes are serialized through a single transport lock; the maps
//! are concurrent so the reader, timers, and handler tasks never contend on
//! one big lock.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use super::capabilities::CapabilityGate;
use super::handler::{HandlerRegistry, ProgressCallback, RequestHandlerContext, RequestHandlerFn, NotificationHandlerFn};
use super::options::{EngineOptions, RequestOptions};
use crate::protocol::constants::methods;
use crate::protocol::messages::{CancelledNotification, ProgressNotification};
use crate::protocol::{
    extract_meta, inject_meta, parse_params, to_params, JsonRpcError, JsonRpcMessage,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpError, McpNotification, McpRequest,
    McpResult, MessageContext, MessageHandler, Meta, ProgressToken, RequestId, Transport,
    TransportBuilder, TransportError,
};

/// One outstanding outbound request
struct PendingEntry {
    /// Completion slot; consumed on resolution
    sender: oneshot::Sender<McpResult<Value>>,
    /// Progress callback, when the caller asked for progress
    progress: Option<ProgressCallback>,
    /// Restarts the timer; present when reset-on-progress is enabled
    reset_tx: Option<mpsc::UnboundedSender<()>>,
    /// Timer task; aborted when the request resolves another way
    timer: Option<JoinHandle<()>>,
}

/// User callback invoked exactly once when the engine drains
type CloseCallback = Box<dyn FnOnce() + Send>;
/// User callback for engine-level errors that have no request to fail
type ErrorCallback = Box<dyn Fn(&McpError) + Send + Sync>;

struct EngineInner {
    /// The transport; `None` after close. The lock also serializes sends.
    transport: Mutex<Option<Box<dyn Transport>>>,
    /// Outstanding outbound requests keyed by numeric id
    pending: DashMap<i64, PendingEntry>,
    /// In-flight inbound requests and their cancellation tokens
    inbound: DashMap<RequestId, CancellationToken>,
    /// Monotonic outbound id counter
    next_id: AtomicI64,
    /// Method-keyed handler tables
    registry: HandlerRegistry,
    /// Role-specific capability assertions
    gate: Box<dyn CapabilityGate>,
    /// Engine-wide options
    options: EngineOptions,
    /// Set once the engine has drained; sends fail fast afterwards
    closed: AtomicBool,
    /// User close callback, fired exactly once
    on_close: StdMutex<Option<CloseCallback>>,
    /// User error callback
    on_error: StdMutex<Option<ErrorCallback>>,
}

/// Role-agnostic JSON-RPC protocol engine
///
/// Cloning is cheap and shares the underlying state; the client and server
/// facades each hold one.
#[derive(Clone)]
pub struct ProtocolEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("pending", &self.inner.pending.len())
            .field("inbound", &self.inner.inbound.len())
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl ProtocolEngine {
    /// Build the transport with this engine attached as its handler, start
    /// it, and return the connected engine
    pub async fn connect<B>(
        builder: B,
        gate: Box<dyn CapabilityGate>,
        options: EngineOptions,
    ) -> McpResult<Self>
    where
        B: TransportBuilder,
    {
        let inner = Arc::new(EngineInner {
            transport: Mutex::new(None),
            pending: DashMap::new(),
            inbound: DashMap::new(),
            next_id: AtomicI64::new(0),
            registry: HandlerRegistry::new(),
            gate,
            options,
            closed: AtomicBool::new(false),
            on_close: StdMutex::new(None),
            on_error: StdMutex::new(None),
        });

        let handler: Arc<dyn MessageHandler> = Arc::new(EngineHandler {
            inner: Arc::downgrade(&inner),
        });
        let mut transport = builder.with_message_handler(handler).build().await?;
        transport.start().await?;
        *inner.transport.lock().await = Some(Box::new(transport));

        Ok(Self { inner })
    }

    /// Session id of the underlying transport, if it has one
    pub async fn session_id(&self) -> Option<String> {
        let guard = self.inner.transport.lock().await;
        guard.as_ref().and_then(|t| t.session_id())
    }

    /// Whether the engine has drained
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Register the callback fired exactly once when the engine drains
    pub fn set_close_callback(&self, callback: impl FnOnce() + Send + 'static) {
        if let Ok(mut slot) = self.inner.on_close.lock() {
            *slot = Some(Box::new(callback));
        }
    }

    /// Register the callback for errors with no request to fail
    pub fn set_error_callback(&self, callback: impl Fn(&McpError) + Send + Sync + 'static) {
        if let Ok(mut slot) = self.inner.on_error.lock() {
            *slot = Some(Box::new(callback));
        }
    }

    /// Register a typed request handler
    ///
    /// Consults the capability gate; registering a handler for a method the
    /// declared capabilities do not cover is a local error.
    pub fn set_request_handler<T, F, Fut>(&self, handler: F) -> McpResult<()>
    where
        T: McpRequest,
        F: Fn(T, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<T::Result>> + Send + 'static,
    {
        self.inner.gate.assert_request_handler_capability(T::METHOD)?;
        self.inner.registry.set_request_handler::<T, F, Fut>(handler);
        Ok(())
    }

    /// Register a typed notification handler
    pub fn set_notification_handler<T, F, Fut>(&self, handler: F)
    where
        T: McpNotification,
        F: Fn(T, MessageContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner
            .registry
            .set_notification_handler::<T, F, Fut>(handler);
    }

    /// Register the fallback handler for unregistered request methods
    pub fn set_fallback_request_handler(&self, handler: RequestHandlerFn) {
        self.inner.registry.set_fallback_request_handler(handler);
    }

    /// Register the fallback handler for unregistered notification methods
    pub fn set_fallback_notification_handler(&self, handler: NotificationHandlerFn) {
        self.inner.registry.set_fallback_notification_handler(handler);
    }

    /// Send a typed request and await its typed result
    pub async fn send_request<T: McpRequest>(
        &self,
        request: T,
        options: RequestOptions,
    ) -> McpResult<T::Result> {
        let params = to_params(&request)?;
        let value = self.send_request_raw(T::METHOD, params, options).await?;
        serde_json::from_value(value)
            .map_err(|e| McpError::parse(format!("malformed {} result: {e}", T::METHOD)))
    }

    /// Send a raw request and await the generic result value
    pub async fn send_request_raw(
        &self,
        method: &str,
        mut params: Option<Value>,
        options: RequestOptions,
    ) -> McpResult<Value> {
        if self.is_closed() {
            return Err(McpError::ConnectionClosed);
        }
        if self.inner.options.enforce_strict_capabilities {
            self.inner.gate.assert_capability_for_method(method)?;
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        // A progress callback rides its token into params._meta.
        if options.on_progress.is_some() {
            let mut meta = extract_meta(&mut params).unwrap_or_else(Meta::default);
            meta.progress_token = Some(ProgressToken::Number(id));
            params = inject_meta(params, &meta);
        }

        let (sender, receiver) = oneshot::channel();
        let (reset_tx, reset_rx) = if options.reset_timeout_on_progress {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let timeout = options.effective_timeout();
        let max_deadline = options.max_total_timeout.map(|cap| Instant::now() + cap);
        let timer = tokio::spawn(run_timer(
            Arc::clone(&self.inner),
            id,
            timeout,
            max_deadline,
            reset_rx,
        ));

        self.inner.pending.insert(
            id,
            PendingEntry {
                sender,
                progress: options.on_progress.clone(),
                reset_tx,
                timer: Some(timer),
            },
        );

        let envelope =
            JsonRpcMessage::Request(JsonRpcRequest::new(method, params, RequestId::Number(id)));
        if let Err(e) = self.inner.send_message(&envelope).await {
            self.inner.resolve_pending(id, Err(e.clone()), true);
            return Err(e);
        }
        debug!(method, id, "request sent");

        let outcome = match options.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    result = receiver => result,
                    _ = token.cancelled() => {
                        self.inner.abort_request(id, "Request cancelled").await;
                        return Err(McpError::aborted("Request cancelled"));
                    }
                }
            }
            None => receiver.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_) => Err(McpError::ConnectionClosed),
        }
    }

    /// Cancel an outstanding outbound request by id
    ///
    /// Idempotent: cancelling a request that already resolved is a no-op.
    pub async fn cancel_request(&self, id: i64, reason: impl Into<String>) {
        self.inner.abort_request(id, reason.into()).await;
    }

    /// Send a typed notification
    pub async fn send_notification<T: McpNotification>(&self, notification: &T) -> McpResult<()> {
        self.inner.gate.assert_notification_capability(T::METHOD)?;
        let params = to_params(notification)?;
        self.inner
            .send_message(&JsonRpcMessage::Notification(JsonRpcNotification::new(
                T::METHOD, params,
            )))
            .await
    }

    /// Send a typed notification routed to the stream of a related request
    ///
    /// Multi-stream transports use the relation to pick the per-request
    /// stream; single-stream transports ignore it.
    pub async fn send_notification_related<T: McpNotification>(
        &self,
        notification: &T,
        related_request_id: RequestId,
    ) -> McpResult<()> {
        self.inner.gate.assert_notification_capability(T::METHOD)?;
        let params = to_params(notification)?;
        let context = MessageContext::default().with_related_request_id(related_request_id);
        self.inner
            .send_message_with_context(
                &JsonRpcMessage::Notification(JsonRpcNotification::new(T::METHOD, params)),
                &context,
            )
            .await
    }

    /// Emit a progress notification for an inbound request
    ///
    /// No-op when the requester did not supply a progress token.
    pub async fn send_progress(
        &self,
        context: &RequestHandlerContext,
        progress: f64,
        total: Option<f64>,
        message: Option<String>,
    ) -> McpResult<()> {
        let Some(token) = context.progress_token().cloned() else {
            return Ok(());
        };
        let notification = ProgressNotification {
            progress_token: token,
            progress,
            total,
            message,
        };
        let params = to_params(&notification)?;
        let envelope =
            JsonRpcMessage::Notification(JsonRpcNotification::new(methods::PROGRESS, params));
        let route = MessageContext::default().with_related_request_id(context.request_id.clone());
        self.inner.send_message_with_context(&envelope, &route).await
    }

    /// Close the transport and drain the engine
    ///
    /// All outstanding requests fail with `ConnectionClosed`, inbound
    /// cancellation tokens fire, timers stop, and the close callback runs
    /// exactly once.
    pub async fn close(&self) -> McpResult<()> {
        let transport = self.inner.transport.lock().await.take();
        if let Some(mut transport) = transport {
            if let Err(e) = transport.close().await {
                warn!(error = %e, "transport close reported an error");
            }
        }
        self.inner.drain();
        Ok(())
    }
}

impl EngineInner {
    async fn send_message(&self, message: &JsonRpcMessage) -> McpResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::ConnectionClosed);
        }
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(McpError::ConnectionClosed)?;
        transport.send(message).await.map_err(McpError::from)
    }

    async fn send_message_with_context(
        &self,
        message: &JsonRpcMessage,
        context: &MessageContext,
    ) -> McpResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::ConnectionClosed);
        }
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(McpError::ConnectionClosed)?;
        transport
            .send_with_context(message, context)
            .await
            .map_err(McpError::from)
    }

    /// Resolve one pending request; returns false when it already resolved
    fn resolve_pending(&self, id: i64, result: McpResult<Value>, abort_timer: bool) -> bool {
        let Some((_, entry)) = self.pending.remove(&id) else {
            return false;
        };
        if abort_timer {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
        let _ = entry.sender.send(result);
        true
    }

    /// Caller-driven cancellation: resolve locally, then notify the peer
    /// best-effort
    async fn abort_request(&self, id: i64, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.resolve_pending(id, Err(McpError::aborted(reason.clone())), true) {
            return;
        }
        self.send_cancelled(id, reason).await;
    }

    async fn send_cancelled(&self, id: i64, reason: String) {
        let notification = CancelledNotification::new(RequestId::Number(id), Some(reason));
        let params = match to_params(&notification) {
            Ok(params) => params,
            Err(_) => return,
        };
        let envelope =
            JsonRpcMessage::Notification(JsonRpcNotification::new(methods::CANCELLED, params));
        if let Err(e) = self.send_message(&envelope).await {
            trace!(id, error = %e, "cancelled notification not delivered");
        }
    }

    fn report_error(&self, error: &McpError) {
        if let Ok(slot) = self.on_error.lock() {
            if let Some(callback) = slot.as_ref() {
                callback(error);
            }
        }
    }

    /// Drain on close: runs at most once
    fn drain(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(
            pending = self.pending.len(),
            inbound = self.inbound.len(),
            "draining engine"
        );

        let ids: Vec<i64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.resolve_pending(id, Err(McpError::ConnectionClosed), true);
        }

        for entry in self.inbound.iter() {
            entry.value().cancel();
        }
        self.inbound.clear();

        if let Ok(mut slot) = self.on_close.lock() {
            if let Some(callback) = slot.take() {
                callback();
            }
        }
    }

    async fn dispatch_request(self: Arc<Self>, mut request: JsonRpcRequest, context: MessageContext) {
        let meta = extract_meta(&mut request.params);
        let method = request.method;
        let id = request.id;

        let token = CancellationToken::new();
        self.inbound.insert(id.clone(), token.clone());

        let handler_context = RequestHandlerContext {
            request_id: id.clone(),
            meta,
            cancellation: token.clone(),
            transport_context: context,
        };

        // Specific handlers win; ping has a built-in default; the fallback
        // catches everything else.
        let result: McpResult<Value> = if self.registry.has_request_handler(&method) {
            match self.registry.request_handler(&method) {
                Some(handler) => handler(request.params, handler_context).await,
                None => Err(McpError::method_not_found(method.clone())),
            }
        } else if method == methods::PING {
            Ok(Value::Object(serde_json::Map::new()))
        } else if let Some(fallback) = self.registry.request_handler(&method) {
            fallback(request.params, handler_context).await
        } else {
            Err(McpError::method_not_found(method.clone()))
        };

        self.inbound.remove(&id);

        // A cancelled request gets no response on the wire.
        if token.is_cancelled() {
            trace!(%id, %method, "suppressing response for cancelled request");
            return;
        }
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let reply = match result {
            Ok(value) => JsonRpcMessage::Response(JsonRpcResponse::new(value, id.clone())),
            Err(error) => {
                debug!(%id, %method, error = %error, "handler returned an error");
                JsonRpcMessage::Error(JsonRpcError::new(error.to_error_object(), Some(id.clone())))
            }
        };
        let route = MessageContext::default().with_related_request_id(id);
        if let Err(e) = self.send_message_with_context(&reply, &route).await {
            warn!(error = %e, "failed to send response");
            self.report_error(&e);
        }
    }

    async fn dispatch_notification(
        self: Arc<Self>,
        notification: JsonRpcNotification,
        context: MessageContext,
    ) {
        match notification.method.as_str() {
            methods::CANCELLED => {
                let Ok(cancelled) = parse_params::<CancelledNotification>(notification.params)
                else {
                    warn!("malformed cancelled notification dropped");
                    return;
                };
                if let Some(token) = self.inbound.get(&cancelled.request_id) {
                    debug!(id = %cancelled.request_id, reason = ?cancelled.reason, "peer cancelled request");
                    token.cancel();
                }
                // Unknown or already-completed ids are a no-op.
            }
            methods::PROGRESS => {
                let Ok(progress) = parse_params::<ProgressNotification>(notification.params) else {
                    warn!("malformed progress notification dropped");
                    return;
                };
                match progress.progress_token.as_number() {
                    Some(id) => {
                        if let Some(entry) = self.pending.get(&id) {
                            if let Some(callback) = &entry.progress {
                                callback(progress.clone());
                            }
                            if let Some(reset) = &entry.reset_tx {
                                let _ = reset.send(());
                            }
                        } else {
                            trace!(id, "progress for unknown request dropped");
                        }
                    }
                    None => {
                        warn!(token = ?progress.progress_token, "non-integer progress token dropped");
                    }
                }
            }
            method => match self.registry.notification_handler(method) {
                Some(handler) => handler(notification.params, context).await,
                None => trace!(method, "unhandled notification dropped"),
            },
        }
    }

    fn handle_response(&self, id: RequestId, result: McpResult<Value>) {
        match id.as_number() {
            Some(id) => {
                if !self.resolve_pending(id, result, true) {
                    warn!(id, "response for unknown request id dropped");
                }
            }
            None => warn!(%id, "response with non-numeric id dropped"),
        }
    }
}

/// Per-request timer: fires the inactivity timeout, restarting on progress
/// resets, but never extending past the absolute cap.
async fn run_timer(
    inner: Arc<EngineInner>,
    id: i64,
    timeout: Duration,
    max_deadline: Option<Instant>,
    mut reset_rx: Option<mpsc::UnboundedReceiver<()>>,
) {
    loop {
        let mut deadline = Instant::now() + timeout;
        if let Some(cap) = max_deadline {
            deadline = deadline.min(cap);
        }

        let reset = async {
            match reset_rx.as_mut() {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                let timeout_ms = timeout.as_millis() as u64;
                // Resolving from inside the timer task: do not abort our own
                // handle, we are about to return anyway.
                if inner.resolve_pending(id, Err(McpError::RequestTimeout { timeout_ms }), false) {
                    debug!(id, timeout_ms, "request timed out");
                    inner.send_cancelled(id, "Request timed out".to_string()).await;
                }
                return;
            }
            restart = reset => {
                match restart {
                    // Progress arrived: restart the window.
                    Some(()) => continue,
                    // Entry resolved elsewhere; the sender side was dropped.
                    None => return,
                }
            }
        }
    }
}

/// The engine's transport-facing half
struct EngineHandler {
    inner: Weak<EngineInner>,
}

#[async_trait]
impl MessageHandler for EngineHandler {
    async fn handle_message(&self, message: JsonRpcMessage, context: MessageContext) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        match message {
            JsonRpcMessage::Request(request) => {
                // Handlers may suspend arbitrarily; never block the reader.
                tokio::spawn(inner.dispatch_request(request, context));
            }
            JsonRpcMessage::Notification(notification) => {
                match notification.method.as_str() {
                    // Engine-internal notifications run inline so that a
                    // progress reset or cancellation is visible before any
                    // later message on the same connection is processed.
                    methods::CANCELLED | methods::PROGRESS => {
                        inner.dispatch_notification(notification, context).await;
                    }
                    _ => {
                        tokio::spawn(inner.dispatch_notification(notification, context));
                    }
                }
            }
            JsonRpcMessage::Response(response) => {
                inner.handle_response(response.id, Ok(response.result));
            }
            JsonRpcMessage::Error(error) => match error.id {
                Some(id) => {
                    inner.handle_response(id, Err(McpError::from_error_object(error.error)));
                }
                None => {
                    let e = McpError::from_error_object(error.error);
                    warn!(error = %e, "peer reported an unattributed error");
                    inner.report_error(&e);
                }
            },
        }
    }

    async fn handle_error(&self, error: TransportError) {
        if let Some(inner) = self.inner.upgrade() {
            let error = McpError::from(error);
            warn!(error = %error, "transport error");
            inner.report_error(&error);
        }
    }

    async fn handle_close(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.drain();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{EmptyResult, PingRequest};
    use serde_json::json;
    use std::time::Duration;

    /// Transport double: records sends, exposes the engine's handler so
    /// tests can inject inbound traffic.
    #[derive(Clone, Default)]
    struct MockShared {
        sent: Arc<StdMutex<Vec<JsonRpcMessage>>>,
        handler: Arc<StdMutex<Option<Arc<dyn MessageHandler>>>>,
    }

    impl MockShared {
        fn sent(&self) -> Vec<JsonRpcMessage> {
            self.sent.lock().unwrap().clone()
        }

        async fn inject(&self, message: JsonRpcMessage) {
            let handler = self.handler.lock().unwrap().clone().unwrap();
            handler
                .handle_message(message, MessageContext::without_session())
                .await;
        }

        async fn inject_close(&self) {
            let handler = self.handler.lock().unwrap().clone().unwrap();
            handler.handle_close().await;
        }
    }

    struct MockTransport {
        shared: MockShared,
        started: bool,
    }

    #[async_trait]
    impl Transport for MockTransport {
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
            self.shared.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        fn session_id(&self) -> Option<String> {
            None
        }
    }

    struct MockBuilder {
        shared: MockShared,
        handler: Option<Arc<dyn MessageHandler>>,
    }

    impl TransportBuilder for MockBuilder {
        type Transport = MockTransport;

        fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
            self.handler = Some(handler);
            self
        }

        async fn build(self) -> Result<MockTransport, TransportError> {
            *self.shared.handler.lock().unwrap() = self.handler;
            Ok(MockTransport {
                shared: self.shared,
                started: false,
            })
        }
    }

    async fn engine_with_mock(options: EngineOptions) -> (ProtocolEngine, MockShared) {
        let shared = MockShared::default();
        let builder = MockBuilder {
            shared: shared.clone(),
            handler: None,
        };
        let engine = ProtocolEngine::connect(
            builder,
            Box::new(super::super::capabilities::AllowAllCapabilities),
            options,
        )
        .await
        .unwrap();
        (engine, shared)
    }

    fn sent_request_id(shared: &MockShared, index: usize) -> i64 {
        match &shared.sent()[index] {
            JsonRpcMessage::Request(r) => r.id.as_number().unwrap(),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_resolves_with_matching_response() {
        let (engine, shared) = engine_with_mock(EngineOptions::default()).await;

        let pending = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .send_request::<PingRequest>(PingRequest::default(), RequestOptions::default())
                    .await
            })
        };
        tokio::task::yield_now().await;
        while shared.sent().is_empty() {
            tokio::task::yield_now().await;
        }

        let id = sent_request_id(&shared, 0);
        shared
            .inject(JsonRpcMessage::Response(JsonRpcResponse::new(
                json!({}),
                RequestId::Number(id),
            )))
            .await;

        let result = pending.await.unwrap().unwrap();
        assert_eq!(result, EmptyResult::default());
    }

    #[tokio::test]
    async fn concurrent_requests_use_unique_ids_and_resolve_out_of_order() {
        let (engine, shared) = engine_with_mock(EngineOptions::default()).await;

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .send_request_raw("tools/list", None, RequestOptions::default())
                    .await
            })
        };
        let second = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .send_request_raw("prompts/list", None, RequestOptions::default())
                    .await
            })
        };
        while shared.sent().len() < 2 {
            tokio::task::yield_now().await;
        }

        let ids: Vec<i64> = (0..2).map(|i| sent_request_id(&shared, i)).collect();
        assert_ne!(ids[0], ids[1]);

        // Answer in reverse order; each response resolves exactly its own
        // request.
        let methods: Vec<&str> = shared
            .sent()
            .iter()
            .map(|m| match m {
                JsonRpcMessage::Request(r) => {
                    if r.method == "tools/list" {
                        "tools/list"
                    } else {
                        "prompts/list"
                    }
                }
                _ => "other",
            })
            .collect();
        let (tools_index, prompts_index) = if methods[0] == "tools/list" { (0, 1) } else { (1, 0) };

        shared
            .inject(JsonRpcMessage::Response(JsonRpcResponse::new(
                json!({"prompts": []}),
                RequestId::Number(ids[prompts_index]),
            )))
            .await;
        shared
            .inject(JsonRpcMessage::Response(JsonRpcResponse::new(
                json!({"tools": []}),
                RequestId::Number(ids[tools_index]),
            )))
            .await;

        assert_eq!(first.await.unwrap().unwrap(), json!({"tools": []}));
        assert_eq!(second.await.unwrap().unwrap(), json!({"prompts": []}));
    }

    #[tokio::test(start_paused = true)]
    async fn request_times_out_and_emits_cancelled() {
        let (engine, shared) = engine_with_mock(EngineOptions::default()).await;

        let options = RequestOptions::default().with_timeout(Duration::from_millis(50));
        let result = engine.send_request_raw("tools/list", None, options).await;
        assert!(matches!(result, Err(McpError::RequestTimeout { .. })));

        // The timeout also pushes a cancelled notification upstream.
        let cancelled = shared.sent().iter().any(|m| {
            matches!(m, JsonRpcMessage::Notification(n) if n.method == methods::CANCELLED)
        });
        assert!(cancelled, "expected notifications/cancelled after timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn progress_resets_timer_but_respects_total_cap() {
        let (engine, shared) = engine_with_mock(EngineOptions::default()).await;

        let options = RequestOptions::default()
            .with_timeout(Duration::from_millis(100))
            .with_reset_timeout_on_progress(true)
            .with_max_total_timeout(Duration::from_millis(250))
            .with_progress(Arc::new(|_| {}));

        let pending = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.send_request_raw("tools/call", None, options).await })
        };
        while shared.sent().is_empty() {
            tokio::task::yield_now().await;
        }
        let id = sent_request_id(&shared, 0);

        // Progress every 60 ms keeps beating the 100 ms window.
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(60)).await;
            shared
                .inject(JsonRpcMessage::Notification(JsonRpcNotification::new(
                    methods::PROGRESS,
                    Some(json!({"progressToken": id, "progress": 0.1})),
                )))
                .await;
        }

        // The absolute cap still fires even though progress keeps arriving.
        let result = pending.await.unwrap();
        assert!(matches!(result, Err(McpError::RequestTimeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn progress_keeps_request_alive_until_response() {
        let (engine, shared) = engine_with_mock(EngineOptions::default()).await;

        let seen = Arc::new(StdMutex::new(0u32));
        let seen_in_callback = Arc::clone(&seen);
        let options = RequestOptions::default()
            .with_timeout(Duration::from_millis(100))
            .with_reset_timeout_on_progress(true)
            .with_progress(Arc::new(move |_p| {
                *seen_in_callback.lock().unwrap() += 1;
            }));

        let pending = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.send_request_raw("tools/call", None, options).await })
        };
        while shared.sent().is_empty() {
            tokio::task::yield_now().await;
        }
        let id = sent_request_id(&shared, 0);

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(80)).await;
            shared
                .inject(JsonRpcMessage::Notification(JsonRpcNotification::new(
                    methods::PROGRESS,
                    Some(json!({"progressToken": id, "progress": 0.5})),
                )))
                .await;
        }
        shared
            .inject(JsonRpcMessage::Response(JsonRpcResponse::new(
                json!({"done": true}),
                RequestId::Number(id),
            )))
            .await;

        // 240 ms of progress-extended waiting beats the 100 ms window.
        let result = pending.await.unwrap().unwrap();
        assert_eq!(result, json!({"done": true}));
        assert_eq!(*seen.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn progress_token_is_injected_into_meta() {
        let (engine, shared) = engine_with_mock(EngineOptions::default()).await;

        let options = RequestOptions::default()
            .with_timeout(Duration::from_secs(5))
            .with_progress(Arc::new(|_| {}));
        let pending = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .send_request_raw("tools/call", Some(json!({"name": "slow"})), options)
                    .await
            })
        };
        while shared.sent().is_empty() {
            tokio::task::yield_now().await;
        }

        match &shared.sent()[0] {
            JsonRpcMessage::Request(r) => {
                let token = &r.params.as_ref().unwrap()["_meta"]["progressToken"];
                assert_eq!(token, &json!(r.id.as_number().unwrap()));
            }
            other => panic!("expected request, got {other:?}"),
        }

        let id = sent_request_id(&shared, 0);
        shared
            .inject(JsonRpcMessage::Response(JsonRpcResponse::new(
                json!({}),
                RequestId::Number(id),
            )))
            .await;
        pending.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn cancellation_aborts_locally_and_notifies_peer() {
        let (engine, shared) = engine_with_mock(EngineOptions::default()).await;

        let token = CancellationToken::new();
        let options = RequestOptions::default()
            .with_timeout(Duration::from_secs(30))
            .with_cancellation(token.clone());

        let pending = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.send_request_raw("tools/call", None, options).await })
        };
        while shared.sent().is_empty() {
            tokio::task::yield_now().await;
        }
        let id = sent_request_id(&shared, 0);

        token.cancel();
        let result = pending.await.unwrap();
        assert!(matches!(result, Err(McpError::Aborted { .. })));

        // Cancelling twice is a no-op.
        engine.cancel_request(id, "again").await;

        while shared.sent().len() < 2 {
            tokio::task::yield_now().await;
        }
        let cancels: Vec<_> = shared
            .sent()
            .iter()
            .filter_map(|m| match m {
                JsonRpcMessage::Notification(n) if n.method == methods::CANCELLED => {
                    Some(n.params.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(cancels.len(), 1, "cancellation must be idempotent");
        assert_eq!(cancels[0].as_ref().unwrap()["requestId"], json!(id));
    }

    #[tokio::test]
    async fn inbound_cancellation_suppresses_response() {
        let (engine, shared) = engine_with_mock(EngineOptions::default()).await;

        let entered = Arc::new(tokio::sync::Notify::new());
        let entered_tx = Arc::clone(&entered);
        engine
            .set_request_handler(
                move |_request: crate::protocol::messages::CallToolRequest, context| {
                    let entered = Arc::clone(&entered_tx);
                    async move {
                        entered.notify_one();
                        context.cancellation.cancelled().await;
                        Ok(crate::protocol::CallToolResult::success(vec![]))
                    }
                },
            )
            .unwrap();

        shared
            .inject(JsonRpcMessage::Request(JsonRpcRequest::new(
                "tools/call",
                Some(json!({"name": "slow"})),
                7,
            )))
            .await;
        entered.notified().await;

        shared
            .inject(JsonRpcMessage::Notification(JsonRpcNotification::new(
                methods::CANCELLED,
                Some(json!({"requestId": 7, "reason": "Request cancelled"})),
            )))
            .await;

        // Give the handler task time to observe cancellation and finish.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }

        let responded = shared
            .sent()
            .iter()
            .any(|m| matches!(m, JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_)));
        assert!(!responded, "cancelled request must produce no response");
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let (engine, shared) = engine_with_mock(EngineOptions::default()).await;
        let _ = &engine;

        shared
            .inject(JsonRpcMessage::Request(JsonRpcRequest::new(
                "no/such/method",
                None,
                3,
            )))
            .await;
        while shared.sent().is_empty() {
            tokio::task::yield_now().await;
        }

        match &shared.sent()[0] {
            JsonRpcMessage::Error(e) => {
                assert_eq!(e.error.code, -32601);
                assert_eq!(e.id, Some(RequestId::Number(3)));
            }
            other => panic!("expected error response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ping_has_a_builtin_handler() {
        let (engine, shared) = engine_with_mock(EngineOptions::default()).await;
        let _ = &engine;

        shared
            .inject(JsonRpcMessage::Request(JsonRpcRequest::new("ping", None, 1)))
            .await;
        while shared.sent().is_empty() {
            tokio::task::yield_now().await;
        }

        match &shared.sent()[0] {
            JsonRpcMessage::Response(r) => {
                assert_eq!(r.result, json!({}));
                assert_eq!(r.id, RequestId::Number(1));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn strict_capabilities_gate_outbound_requests() {
        struct DenyTools;
        impl CapabilityGate for DenyTools {
            fn assert_capability_for_method(&self, method: &str) -> McpResult<()> {
                if method.starts_with("tools/") {
                    Err(McpError::capability(format!("{method} not advertised")))
                } else {
                    Ok(())
                }
            }
            fn assert_notification_capability(&self, _method: &str) -> McpResult<()> {
                Ok(())
            }
            fn assert_request_handler_capability(&self, _method: &str) -> McpResult<()> {
                Ok(())
            }
        }

        let shared = MockShared::default();
        let builder = MockBuilder {
            shared: shared.clone(),
            handler: None,
        };
        let engine = ProtocolEngine::connect(
            builder,
            Box::new(DenyTools),
            EngineOptions {
                enforce_strict_capabilities: true,
            },
        )
        .await
        .unwrap();

        let result = engine
            .send_request_raw("tools/list", None, RequestOptions::default())
            .await;
        assert!(matches!(result, Err(McpError::CapabilityUnsupported { .. })));
        assert!(shared.sent().is_empty(), "gate failures never touch the wire");
    }

    #[tokio::test]
    async fn close_drains_pending_and_fires_callback_once() {
        let (engine, shared) = engine_with_mock(EngineOptions::default()).await;

        let closes = Arc::new(StdMutex::new(0u32));
        let closes_cb = Arc::clone(&closes);
        engine.set_close_callback(move || {
            *closes_cb.lock().unwrap() += 1;
        });

        let pending = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .send_request_raw(
                        "tools/list",
                        None,
                        RequestOptions::default().with_timeout(Duration::from_secs(60)),
                    )
                    .await
            })
        };
        while shared.sent().is_empty() {
            tokio::task::yield_now().await;
        }

        engine.close().await.unwrap();
        let result = pending.await.unwrap();
        assert!(matches!(result, Err(McpError::ConnectionClosed)));

        // A transport-driven close after an engine close stays a no-op.
        shared.inject_close().await;
        assert_eq!(*closes.lock().unwrap(), 1);

        let late = engine
            .send_request_raw("tools/list", None, RequestOptions::default())
            .await;
        assert!(matches!(late, Err(McpError::ConnectionClosed)));
    }
}
