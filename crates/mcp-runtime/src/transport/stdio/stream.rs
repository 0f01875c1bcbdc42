//! Generic Byte-Stream Transport
//!
//! Reads newline-delimited JSON from any `AsyncRead`, writes framed
//! envelopes to any `AsyncWrite`. The background reader closes the transport
//! when the input stream ends or errors; malformed lines are reported
//! through the handler and reading continues with the next line.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, Stdin, Stdout};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

// Layer 3: Internal module imports
use crate::protocol::{
    JsonRpcMessage, MessageContext, MessageHandler, Transport, TransportBuilder, TransportError,
};
use crate::transport::framing::{serialize_message, ReadBuffer};

/// Read chunk size for the background reader
const READ_CHUNK: usize = 8 * 1024;

/// Shared close-once latch: both the EOF path and explicit `close()` funnel
/// through it so the handler's close callback fires exactly once.
#[derive(Clone)]
struct CloseLatch {
    fired: Arc<AtomicBool>,
    handler: Arc<dyn MessageHandler>,
}

impl CloseLatch {
    async fn fire(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            self.handler.handle_close().await;
        }
    }

    fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Transport over a paired reader and writer
///
/// # Type Parameters
///
/// * `R` - input byte stream (`AsyncRead`)
/// * `W` - output byte sink (`AsyncWrite`)
pub struct StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    handler: Arc<dyn MessageHandler>,
    /// Taken by `start()`
    reader: Option<R>,
    writer: W,
    read_task: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
    latch: CloseLatch,
    started: bool,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a transport over the given stream pair
    pub fn new(reader: R, writer: W, handler: Arc<dyn MessageHandler>) -> Self {
        let latch = CloseLatch {
            fired: Arc::new(AtomicBool::new(false)),
            handler: Arc::clone(&handler),
        };
        Self {
            handler,
            reader: Some(reader),
            writer,
            read_task: None,
            shutdown: CancellationToken::new(),
            latch,
            started: false,
        }
    }

    /// Background read loop: framing + dispatch until EOF, error, or shutdown
    async fn read_loop(
        mut reader: R,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
        latch: CloseLatch,
    ) {
        let mut buffer = ReadBuffer::new();
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            let read = tokio::select! {
                read = reader.read(&mut chunk) => read,
                _ = shutdown.cancelled() => break,
            };

            match read {
                Ok(0) => {
                    debug!("input stream reached EOF");
                    break;
                }
                Ok(n) => {
                    buffer.append(&chunk[..n]);
                    loop {
                        match buffer.read_message() {
                            Ok(Some(message)) => {
                                trace!(method = ?message.method(), "frame received");
                                handler
                                    .handle_message(message, MessageContext::without_session())
                                    .await;
                            }
                            Ok(None) => break,
                            Err(e) => {
                                handler
                                    .handle_error(TransportError::protocol(e.to_string()))
                                    .await;
                            }
                        }
                    }
                }
                Err(e) => {
                    handler.handle_error(TransportError::from(e)).await;
                    break;
                }
            }
        }

        latch.fire().await;
    }
}

#[async_trait]
impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + Sync + 'static,
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    async fn start(&mut self) -> Result<(), TransportError> {
        if self.started {
            return Err(TransportError::AlreadyStarted);
        }
        let reader = self.reader.take().ok_or(TransportError::AlreadyStarted)?;
        self.started = true;

        self.read_task = Some(tokio::spawn(Self::read_loop(
            reader,
            Arc::clone(&self.handler),
            self.shutdown.clone(),
            self.latch.clone(),
        )));
        Ok(())
    }

    async fn send(&mut self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }
        if self.latch.is_fired() {
            return Err(TransportError::Closed);
        }
        let frame = serialize_message(message)
            .map_err(|e| TransportError::protocol(e.to_string()))?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.shutdown.cancel();
        let _ = self.writer.shutdown().await;
        if let Some(task) = self.read_task.take() {
            let _ = task.await;
        }
        self.latch.fire().await;
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        None
    }
}

/// Transport over the process's own stdin/stdout
pub type StdioTransport = StreamTransport<Stdin, Stdout>;

/// Builder for [`StdioTransport`]
#[derive(Default)]
pub struct StdioTransportBuilder {
    handler: Option<Arc<dyn MessageHandler>>,
}

impl StdioTransportBuilder {
    /// Create a builder
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransportBuilder for StdioTransportBuilder {
    type Transport = StdioTransport;

    fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    async fn build(self) -> Result<Self::Transport, TransportError> {
        let handler = self
            .handler
            .ok_or_else(|| TransportError::other("message handler not configured"))?;
        Ok(StreamTransport::new(
            tokio::io::stdin(),
            tokio::io::stdout(),
            handler,
        ))
    }
}

/// Builder for a transport over arbitrary stream halves
pub struct StreamTransportBuilder<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    reader: R,
    writer: W,
    handler: Option<Arc<dyn MessageHandler>>,
}

impl<R, W> StreamTransportBuilder<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    /// Create a builder over the given stream pair
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            handler: None,
        }
    }
}

impl<R, W> TransportBuilder for StreamTransportBuilder<R, W>
where
    R: AsyncRead + Unpin + Send + Sync + 'static,
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    type Transport = StreamTransport<R, W>;

    fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    async fn build(self) -> Result<Self::Transport, TransportError> {
        let handler = self
            .handler
            .ok_or_else(|| TransportError::other("message handler not configured"))?;
        Ok(StreamTransport::new(self.reader, self.writer, handler))
    }
}

/// In-memory transport builder pair wired back to back
///
/// Frames written by one side are read by the other, emulating a client and
/// server in one process.
pub fn duplex_pair(
    max_buffered: usize,
) -> (
    StreamTransportBuilder<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>,
    StreamTransportBuilder<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>,
) {
    let (near, far) = tokio::io::duplex(max_buffered);
    let (near_read, near_write) = tokio::io::split(near);
    let (far_read, far_write) = tokio::io::split(far);
    (
        StreamTransportBuilder::new(near_read, near_write),
        StreamTransportBuilder::new(far_read, far_write),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{JsonRpcRequest, JsonRpcResponse, RequestId};
    use std::sync::Mutex as StdMutex;
    use tokio_test::assert_ok;

    struct RecordingHandler {
        messages: StdMutex<Vec<JsonRpcMessage>>,
        errors: StdMutex<Vec<String>>,
        closes: StdMutex<u32>,
        notify: tokio::sync::Notify,
    }

    impl RecordingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: StdMutex::new(Vec::new()),
                errors: StdMutex::new(Vec::new()),
                closes: StdMutex::new(0),
                notify: tokio::sync::Notify::new(),
            })
        }
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle_message(&self, message: JsonRpcMessage, _context: MessageContext) {
            self.messages.lock().unwrap().push(message);
            self.notify.notify_waiters();
        }

        async fn handle_error(&self, error: TransportError) {
            self.errors.lock().unwrap().push(error.to_string());
            self.notify.notify_waiters();
        }

        async fn handle_close(&self) {
            *self.closes.lock().unwrap() += 1;
            self.notify.notify_waiters();
        }
    }

    #[tokio::test]
    async fn duplex_pair_delivers_frames_both_ways() {
        let near_handler = RecordingHandler::new();
        let far_handler = RecordingHandler::new();

        let (near_builder, far_builder) = duplex_pair(64 * 1024);
        let mut near = near_builder
            .with_message_handler(near_handler.clone() as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        let mut far = far_builder
            .with_message_handler(far_handler.clone() as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        near.start().await.unwrap();
        far.start().await.unwrap();

        let ping = JsonRpcMessage::Request(JsonRpcRequest::new("ping", None, 1));
        near.send(&ping).await.unwrap();
        while far_handler.messages.lock().unwrap().is_empty() {
            far_handler.notify.notified().await;
        }
        assert_eq!(far_handler.messages.lock().unwrap()[0], ping);

        let pong = JsonRpcMessage::Response(JsonRpcResponse::new(
            serde_json::json!({}),
            RequestId::Number(1),
        ));
        far.send(&pong).await.unwrap();
        while near_handler.messages.lock().unwrap().is_empty() {
            near_handler.notify.notified().await;
        }
        assert_eq!(near_handler.messages.lock().unwrap()[0], pong);

        assert_ok!(near.close().await);
        assert_ok!(far.close().await);
    }

    #[tokio::test]
    async fn start_twice_fails() {
        let handler = RecordingHandler::new();
        let (builder, _other) = duplex_pair(1024);
        let mut transport = builder
            .with_message_handler(handler as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        transport.start().await.unwrap();
        assert!(matches!(
            transport.start().await,
            Err(TransportError::AlreadyStarted)
        ));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn send_before_start_fails() {
        let handler = RecordingHandler::new();
        let (builder, _other) = duplex_pair(1024);
        let mut transport = builder
            .with_message_handler(handler as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        let ping = JsonRpcMessage::Request(JsonRpcRequest::new("ping", None, 1));
        assert!(matches!(
            transport.send(&ping).await,
            Err(TransportError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn peer_eof_closes_exactly_once() {
        let handler = RecordingHandler::new();
        let (builder, other) = duplex_pair(1024);
        let mut transport = builder
            .with_message_handler(handler.clone() as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        transport.start().await.unwrap();

        // Dropping the far side ends the near side's input stream.
        drop(other);
        while *handler.closes.lock().unwrap() == 0 {
            handler.notify.notified().await;
        }

        // An explicit close afterwards must not fire the callback again.
        transport.close().await.unwrap();
        assert_eq!(*handler.closes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn malformed_line_reports_error_and_reading_continues() {
        let handler = RecordingHandler::new();
        let (builder, other) = duplex_pair(4096);
        let mut transport = builder
            .with_message_handler(handler.clone() as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        transport.start().await.unwrap();

        // Write a poison line then a valid frame straight onto the pipe.
        let (_read, mut write) = (other.reader, other.writer);
        write.write_all(b"{broken\n").await.unwrap();
        let frame =
            serialize_message(&JsonRpcMessage::Request(JsonRpcRequest::new("ping", None, 2)))
                .unwrap();
        write.write_all(&frame).await.unwrap();
        write.flush().await.unwrap();

        while handler.messages.lock().unwrap().is_empty() {
            handler.notify.notified().await;
        }
        assert_eq!(handler.errors.lock().unwrap().len(), 1);
        assert_eq!(
            handler.messages.lock().unwrap()[0].method(),
            Some("ping")
        );
        transport.close().await.unwrap();
    }
}
