//! Legacy HTTP+SSE Server Transport
//!
//! The pre-Streamable transport shape: one GET establishes the event
//! stream, a sibling POST endpoint receives client messages. Kept for
//! clients that have not migrated to the single-endpoint transport.

// Module declarations (declarations only in mod.rs)
pub mod server;

// Public re-exports
pub use server::{SseServerConfig, SseServerTransport, SseServerTransportBuilder};
