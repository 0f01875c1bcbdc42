//! Transport Layer
//!
//! Concrete transports implementing the contract in
//! [`crate::protocol::transport`]:
//!
//! - `framing`: newline-delimited JSON reader/writer shared by the byte
//!   stream transports
//! - `stdio`: process stdin/stdout, spawned child processes, and in-memory
//!   duplex pipes
//! - `sse`: the legacy HTTP+SSE server transport (`GET /sse` +
//!   `POST /messages`)
//! - `streamable`: the Streamable HTTP server and client transports plus the
//!   event store contract for resumability

// Module declarations (declarations only in mod.rs)
pub mod framing;
pub mod sse;
pub mod stdio;
pub mod streamable;

// Public re-exports
pub use framing::{serialize_message, ReadBuffer};
pub use stdio::{
    duplex_pair, ChildProcessTransport, ChildProcessTransportBuilder, StdioTransport,
    StdioTransportBuilder, StreamTransport, StreamTransportBuilder,
};
pub use streamable::{
    EventId, EventStore, InMemoryEventStore, OAuthClientProvider, ReconnectOptions,
    StreamId, StreamableHttpClientTransport, StreamableHttpClientTransportBuilder,
    StreamableHttpServerConfig, StreamableHttpServerHandle, StreamableHttpServerTransport,
    StreamableHttpServerTransportBuilder,
};
pub use sse::{SseServerConfig, SseServerTransport, SseServerTransportBuilder};
