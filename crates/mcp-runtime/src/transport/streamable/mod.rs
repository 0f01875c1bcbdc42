//! Streamable HTTP Transport
//!
//! The modern MCP HTTP transport: one `/mcp` endpoint multiplexing JSON
//! responses, per-request SSE streams, and a standalone GET SSE stream, with
//! session identity and event-store-backed resumability.
//!
//! - `server`: axum-based server transport
//! - `client`: reqwest-based client transport with reconnection and auth
//! - `event_store`: the resumability contract plus an in-memory reference
//!   implementation

// Module declarations (declarations only in mod.rs)
pub mod client;
pub mod event_store;
pub mod server;

// Public re-exports
pub use client::{
    OAuthClientProvider, ReconnectOptions, StreamableHttpClientTransport,
    StreamableHttpClientTransportBuilder,
};
pub use event_store::{EventId, EventStore, InMemoryEventStore, StreamId};
pub use server::{
    StreamableHttpServerConfig, StreamableHttpServerHandle, StreamableHttpServerTransport,
    StreamableHttpServerTransportBuilder, STANDALONE_STREAM_ID,
};
