//! Handler Registry and Request Context
//!
//! The registry maps method names to type-erased handler closures. Typed
//! registration wraps the user's handler in a parse step: the envelope's
//! generic params map is decoded into the typed payload before the handler
//! runs, and decode failures become `InvalidParams` errors without the
//! handler ever seeing the message.

// Layer 1: Standard library imports
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

// Layer 3: Internal module imports
use crate::protocol::messages::{parse_params, ProgressNotification};
use crate::protocol::{MessageContext, McpResult, Meta, RequestId};

/// Boxed future returned by type-erased handlers
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Type-erased request handler: generic params in, generic result out
pub type RequestHandlerFn =
    Arc<dyn Fn(Option<Value>, RequestHandlerContext) -> BoxFuture<McpResult<Value>> + Send + Sync>;

/// Type-erased notification handler
pub type NotificationHandlerFn =
    Arc<dyn Fn(Option<Value>, MessageContext) -> BoxFuture<()> + Send + Sync>;

/// Callback driven by `notifications/progress` for an outstanding request
pub type ProgressCallback = Arc<dyn Fn(ProgressNotification) + Send + Sync>;

/// Context handed to every inbound request handler
///
/// Carries the cancellation token the engine will trigger when the peer
/// cancels the request, plus the `_meta` stripped from the params and the
/// transport context the request arrived on.
#[derive(Clone)]
pub struct RequestHandlerContext {
    /// Id of the inbound request
    pub request_id: RequestId,

    /// `_meta` stripped from the request params, if any
    pub meta: Option<Meta>,

    /// Cancelled when the peer sends `notifications/cancelled` for this
    /// request; handlers should stop work and return promptly
    pub cancellation: CancellationToken,

    /// Transport context the request arrived with
    pub transport_context: MessageContext,
}

impl RequestHandlerContext {
    /// Progress token the requester supplied, if it wants progress
    pub fn progress_token(&self) -> Option<&crate::protocol::ProgressToken> {
        self.meta.as_ref().and_then(|m| m.progress_token.as_ref())
    }

    /// Whether the peer has cancelled this request
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl std::fmt::Debug for RequestHandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandlerContext")
            .field("request_id", &self.request_id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Method-keyed handler tables plus fallbacks
#[derive(Default)]
pub struct HandlerRegistry {
    requests: DashMap<String, RequestHandlerFn>,
    notifications: DashMap<String, NotificationHandlerFn>,
    fallback_request: std::sync::RwLock<Option<RequestHandlerFn>>,
    fallback_notification: std::sync::RwLock<Option<NotificationHandlerFn>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed request handler
    ///
    /// The wrapper parses params into `T` (shape mismatches become
    /// `InvalidParams`) and serializes the typed result back into the
    /// generic result slot.
    pub fn set_request_handler<T, F, Fut>(&self, handler: F)
    where
        T: crate::protocol::McpRequest,
        F: Fn(T, RequestHandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<T::Result>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let wrapped: RequestHandlerFn = Arc::new(move |params, context| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let typed: T = parse_params(params)?;
                let result = handler(typed, context).await?;
                serde_json::to_value(result).map_err(|e| {
                    crate::protocol::McpError::internal(format!("result encoding failed: {e}"))
                })
            })
        });
        self.requests.insert(T::METHOD.to_string(), wrapped);
    }

    /// Register a typed notification handler
    pub fn set_notification_handler<T, F, Fut>(&self, handler: F)
    where
        T: crate::protocol::McpNotification,
        F: Fn(T, MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let wrapped: NotificationHandlerFn = Arc::new(move |params, context| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                match parse_params::<T>(params) {
                    Ok(typed) => handler(typed, context).await,
                    Err(e) => {
                        tracing::warn!(method = T::METHOD, error = %e, "dropping malformed notification");
                    }
                }
            })
        });
        self.notifications.insert(T::METHOD.to_string(), wrapped);
    }

    /// Register the fallback request handler for unregistered methods
    pub fn set_fallback_request_handler(&self, handler: RequestHandlerFn) {
        if let Ok(mut slot) = self.fallback_request.write() {
            *slot = Some(handler);
        }
    }

    /// Register the fallback notification handler for unregistered methods
    pub fn set_fallback_notification_handler(&self, handler: NotificationHandlerFn) {
        if let Ok(mut slot) = self.fallback_notification.write() {
            *slot = Some(handler);
        }
    }

    /// Remove a request handler
    pub fn remove_request_handler(&self, method: &str) {
        self.requests.remove(method);
    }

    /// Look up the handler for an inbound request, falling back when the
    /// method is unregistered
    pub fn request_handler(&self, method: &str) -> Option<RequestHandlerFn> {
        self.requests
            .get(method)
            .map(|h| Arc::clone(&h))
            .or_else(|| {
                self.fallback_request
                    .read()
                    .ok()
                    .and_then(|slot| slot.clone())
            })
    }

    /// Look up the handler for an inbound notification
    pub fn notification_handler(&self, method: &str) -> Option<NotificationHandlerFn> {
        self.notifications
            .get(method)
            .map(|h| Arc::clone(&h))
            .or_else(|| {
                self.fallback_notification
                    .read()
                    .ok()
                    .and_then(|slot| slot.clone())
            })
    }

    /// Whether a specific (non-fallback) request handler exists
    pub fn has_request_handler(&self, method: &str) -> bool {
        self.requests.contains_key(method)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("requests", &self.requests.len())
            .field("notifications", &self.notifications.len())
            .finish()
    }
}
