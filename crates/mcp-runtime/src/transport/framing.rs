//! Newline-Delimited JSON Framing
//!
//! Message boundaries are single `\n` (0x0A) bytes. The reader is a plain
//! byte accumulator so every stream transport (stdio, child process pipes,
//! in-memory duplex) and the HTTP client's chunked bodies can feed it
//! without caring where read boundaries fall.
//!
//! A line that fails to parse (bad UTF-8 or bad JSON) is discarded up to its
//! newline and reported as an error; parsing resumes with the next line.

// Layer 2: Third-party crate imports
use bytes::{Bytes, BytesMut};

// Layer 3: Internal module imports
use crate::protocol::{JsonRpcMessage, McpError, McpResult};

/// Incremental reader over newline-delimited JSON bytes
///
/// # Examples
///
/// ```rust
/// use mcp_runtime::transport::framing::ReadBuffer;
///
/// let mut buffer = ReadBuffer::new();
/// buffer.append(br#"{"jsonrpc":"2.0","method":"ping","id":1}"#);
/// assert!(buffer.read_message().unwrap().is_none()); // no newline yet
/// buffer.append(b"\n");
/// assert!(buffer.read_message().unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct ReadBuffer {
    buffer: BytesMut,
}

impl ReadBuffer {
    /// Create an empty read buffer
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Append bytes received from the underlying stream
    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True when no bytes are buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard all buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Extract at most one complete message
    ///
    /// Returns `Ok(None)` when no full line is buffered. Blank lines are
    /// skipped. On a malformed line the offending bytes are consumed before
    /// the error is returned, so the caller can report it and keep reading.
    pub fn read_message(&mut self) -> McpResult<Option<JsonRpcMessage>> {
        loop {
            let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };
            let line = self.buffer.split_to(newline + 1);
            let line = &line[..line.len() - 1];

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let text = std::str::from_utf8(line)
                .map_err(|e| McpError::parse(format!("invalid utf-8 in frame: {e}")))?;
            let value: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| McpError::parse(format!("invalid json in frame: {e}")))?;
            return JsonRpcMessage::from_value(value).map(Some);
        }
    }
}

/// Serialize one message as `json + "\n"`
pub fn serialize_message(message: &JsonRpcMessage) -> McpResult<Bytes> {
    let mut out = serde_json::to_vec(message)
        .map_err(|e| McpError::internal(format!("frame encoding failed: {e}")))?;
    out.push(b'\n');
    Ok(Bytes::from(out))
}
