//! Transport Abstractions
//!
//! Event-driven transport contract consumed by the protocol engine. A
//! transport delivers decoded envelopes through a [`MessageHandler`] and
//! accepts outbound envelopes through [`Transport::send`]; the engine never
//! sees bytes or HTTP.
//!
//! # Design
//!
//! - **Event-driven**: callbacks instead of blocking receive loops.
//! - **Pre-configured**: transports are built with their handler already
//!   attached ([`TransportBuilder::with_message_handler`]), so there is no
//!   window where messages arrive with nobody listening.
//! - **Session-aware**: session identity is part of the contract surface but
//!   only session-based transports populate it.
//!
//! Transports are not assumed concurrent-send-safe; the engine serializes
//! outbound writes per transport.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

// Layer 3: Internal module imports
use super::message::JsonRpcMessage;

/// Transport error types for comprehensive error handling
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection-related errors
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Message serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// The transport was started twice
    #[error("Transport already started")]
    AlreadyStarted,

    /// An operation requires a started transport
    #[error("Transport not started")]
    NotStarted,

    /// The transport was closed; sends fail fast from then on
    #[error("Transport closed")]
    Closed,

    /// An inbound or outbound message exceeded the configured limit
    #[error("Message of {size} bytes exceeds limit of {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    /// Authentication/authorization errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Protocol-level errors attributable to the transport layer
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Generic transport errors
    #[error("Transport error: {message}")]
    Other { message: String },
}

impl TransportError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a generic transport error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// Message context for session and metadata management
///
/// Carried alongside every delivered envelope so multi-session transports
/// (HTTP) can tell the handler which peer is talking.
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    /// Session identifier, for session-based transports
    session_id: Option<String>,

    /// When the message was received
    timestamp: Option<DateTime<Utc>>,

    /// The inbound request this message is related to, when the transport
    /// needs responses routed back to a specific stream
    related_request_id: Option<super::message::RequestId>,

    /// Additional transport metadata (remote address, headers of note)
    metadata: HashMap<String, String>,
}

impl MessageContext {
    /// Create a context for the given session
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            timestamp: Some(Utc::now()),
            related_request_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a context without a session (single-connection transports)
    pub fn without_session() -> Self {
        Self {
            session_id: None,
            timestamp: Some(Utc::now()),
            related_request_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Session ID, if any
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Receive timestamp
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Related request id, if the transport tracks per-request streams
    pub fn related_request_id(&self) -> Option<&super::message::RequestId> {
        self.related_request_id.as_ref()
    }

    /// Attach a related request id
    pub fn with_related_request_id(mut self, id: super::message::RequestId) -> Self {
        self.related_request_id = Some(id);
        self
    }

    /// Metadata value by key
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Event-driven message handler
///
/// Implemented by the protocol engine (and by tests). Errors raised inside
/// these callbacks stay inside the handler; transports log and continue.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an incoming JSON-RPC envelope
    async fn handle_message(&self, message: JsonRpcMessage, context: MessageContext);

    /// Handle a transport-level error that produced no envelope
    async fn handle_error(&self, error: TransportError);

    /// Handle transport closure; called exactly once
    async fn handle_close(&self);
}

/// Transport contract
///
/// Lifecycle: `start` begins background reading (calling it twice is an
/// error), `send` writes one envelope (failing when not started or already
/// closed), `close` releases resources and fires the handler's close
/// callback exactly once. `close` is idempotent.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start the transport and begin delivering messages
    async fn start(&mut self) -> Result<(), TransportError>;

    /// Send a JSON-RPC envelope through the transport
    async fn send(&mut self, message: &JsonRpcMessage) -> Result<(), TransportError>;

    /// Send an envelope with routing context
    ///
    /// Multi-stream transports use `context.related_request_id()` to route
    /// handler-emitted notifications onto the stream of the request that
    /// produced them. The default ignores the context.
    async fn send_with_context(
        &mut self,
        message: &JsonRpcMessage,
        _context: &MessageContext,
    ) -> Result<(), TransportError> {
        self.send(message).await
    }

    /// Close the transport and release resources
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Current session ID, populated only by session-aware transports
    fn session_id(&self) -> Option<String>;
}

/// Builder for pre-configured transports
///
/// The handler must be attached before `build`; the returned transport is
/// ready to `start`.
pub trait TransportBuilder: Send + Sync {
    /// The transport type this builder creates
    type Transport: Transport + 'static;

    /// Attach the message handler
    fn with_message_handler(self, handler: Arc<dyn MessageHandler>) -> Self;

    /// Build the configured transport
    fn build(
        self,
    ) -> impl std::future::Future<Output = Result<Self::Transport, TransportError>> + Send;
}
