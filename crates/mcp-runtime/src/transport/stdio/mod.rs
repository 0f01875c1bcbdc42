//! Stdio and Byte-Stream Transports
//!
//! Newline-delimited JSON over paired byte streams:
//!
//! - [`StdioTransport`]: the process's own stdin/stdout (server side of a
//!   spawned MCP server)
//! - [`ChildProcessTransport`]: spawn a server as a child process and talk
//!   over its pipes (client side)
//! - [`duplex_pair`]: two in-memory transports wired back to back for tests
//!   and single-process embedding

// Module declarations (declarations only in mod.rs)
pub mod child;
pub mod stream;

// Public re-exports
pub use child::{ChildProcessTransport, ChildProcessTransportBuilder};
pub use stream::{
    duplex_pair, StdioTransport, StdioTransportBuilder, StreamTransport, StreamTransportBuilder,
};
