//! Child Process Transport
//!
//! Client-side stdio transport that spawns the MCP server as a child
//! process and frames JSON-RPC over its pipes. Closing is graceful first:
//! stdin is shut down so the server sees EOF, the child gets a bounded
//! window to exit, and only then is it killed.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use crate::protocol::{
    JsonRpcMessage, MessageContext, MessageHandler, Transport, TransportBuilder, TransportError,
};
use crate::transport::framing::{serialize_message, ReadBuffer};

/// How long the child may exit gracefully before being killed
const GRACEFUL_EXIT_WINDOW: Duration = Duration::from_secs(2);

/// Stdio transport over a spawned child process
pub struct ChildProcessTransport {
    handler: Arc<dyn MessageHandler>,
    child: Child,
    /// Child's stdin; dropped on close to signal EOF
    stdin: Option<ChildStdin>,
    /// Taken by `start()`
    stdout: Option<ChildStdout>,
    /// Child's stderr when piped rather than inherited
    stderr: Option<ChildStderr>,
    read_task: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
    close_fired: Arc<AtomicBool>,
    started: bool,
}

impl ChildProcessTransport {
    /// Take the child's stderr stream, when the builder piped it
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    /// OS process id of the child, while it is running
    pub fn child_id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn fire_close(
        fired: &AtomicBool,
        handler: &Arc<dyn MessageHandler>,
    ) {
        if !fired.swap(true, Ordering::SeqCst) {
            handler.handle_close().await;
        }
    }

    async fn read_loop(
        mut stdout: ChildStdout,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
        close_fired: Arc<AtomicBool>,
    ) {
        let mut buffer = ReadBuffer::new();
        let mut chunk = vec![0u8; 8 * 1024];

        loop {
            let read = tokio::select! {
                read = stdout.read(&mut chunk) => read,
                _ = shutdown.cancelled() => break,
            };
            match read {
                Ok(0) => {
                    debug!("child stdout reached EOF");
                    break;
                }
                Ok(n) => {
                    buffer.append(&chunk[..n]);
                    loop {
                        match buffer.read_message() {
                            Ok(Some(message)) => {
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

        Self::fire_close(&close_fired, &handler).await;
    }
}

#[async_trait]
impl Transport for ChildProcessTransport {
    async fn start(&mut self) -> Result<(), TransportError> {
        if self.started {
            return Err(TransportError::AlreadyStarted);
        }
        let stdout = self.stdout.take().ok_or(TransportError::AlreadyStarted)?;
        self.started = true;

        self.read_task = Some(tokio::spawn(Self::read_loop(
            stdout,
            Arc::clone(&self.handler),
            self.shutdown.clone(),
            Arc::clone(&self.close_fired),
        )));
        Ok(())
    }

    async fn send(&mut self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }
        if self.close_fired.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let stdin = self.stdin.as_mut().ok_or(TransportError::Closed)?;
        let frame = serialize_message(message)
            .map_err(|e| TransportError::protocol(e.to_string()))?;
        stdin.write_all(&frame).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.shutdown.cancel();

        // Graceful: EOF on the child's stdin asks it to exit.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }

        // Bounded wait, then force.
        match timeout(GRACEFUL_EXIT_WINDOW, self.child.wait()).await {
            Ok(Ok(status)) => {
                if !status.success() {
                    self.handler
                        .handle_error(TransportError::connection(format!(
                            "child exited with status {status}"
                        )))
                        .await;
                }
            }
            Ok(Err(e)) => {
                self.handler.handle_error(TransportError::from(e)).await;
            }
            Err(_) => {
                warn!("child did not exit within {GRACEFUL_EXIT_WINDOW:?}, killing");
                if let Err(e) = self.child.kill().await {
                    self.handler.handle_error(TransportError::from(e)).await;
                }
            }
        }

        if let Some(task) = self.read_task.take() {
            let _ = task.await;
        }
        Self::fire_close(&self.close_fired, &self.handler).await;
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        None
    }
}

impl Drop for ChildProcessTransport {
    fn drop(&mut self) {
        // Best-effort kill so a dropped transport cannot orphan the child.
        let _ = self.child.start_kill();
    }
}

/// Builder for [`ChildProcessTransport`]
///
/// # Examples
///
/// ```rust,no_run
/// use mcp_runtime::transport::stdio::ChildProcessTransportBuilder;
///
/// let builder = ChildProcessTransportBuilder::new("python")
///     .arg("-m")
///     .arg("my_mcp_server")
///     .env("LOG_LEVEL", "debug")
///     .inherit_stderr(true);
/// ```
pub struct ChildProcessTransportBuilder {
    command: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    envs: HashMap<String, String>,
    inherit_stderr: bool,
    handler: Option<Arc<dyn MessageHandler>>,
}

impl ChildProcessTransportBuilder {
    /// Create a builder for the given server command
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            envs: HashMap::new(),
            inherit_stderr: false,
            handler: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the child's working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set one environment variable for the child
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    /// Inherit the parent's stderr instead of piping it
    pub fn inherit_stderr(mut self, inherit: bool) -> Self {
        self.inherit_stderr = inherit;
        self
    }
}

impl TransportBuilder for ChildProcessTransportBuilder {
    type Transport = ChildProcessTransport;

    fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    async fn build(self) -> Result<ChildProcessTransport, TransportError> {
        let handler = self
            .handler
            .ok_or_else(|| TransportError::other("message handler not configured"))?;

        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .envs(&self.envs)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if self.inherit_stderr {
                Stdio::inherit()
            } else {
                Stdio::piped()
            })
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            TransportError::connection(format!("failed to spawn {}: {e}", self.command))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::connection("child stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::connection("child stdout unavailable"))?;
        let stderr = child.stderr.take();

        debug!(command = %self.command, pid = ?child.id(), "child process spawned");

        Ok(ChildProcessTransport {
            handler,
            child,
            stdin: Some(stdin),
            stdout: Some(stdout),
            stderr,
            read_task: None,
            shutdown: CancellationToken::new(),
            close_fired: Arc::new(AtomicBool::new(false)),
            started: false,
        })
    }
}
