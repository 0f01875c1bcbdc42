//! Engine and Per-Request Options

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use tokio_util::sync::CancellationToken;

// Layer 3: Internal module imports
use super::handler::ProgressCallback;
use crate::protocol::constants::defaults;

/// Engine-wide configuration
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Consult the capability gate before every outbound request
    pub enforce_strict_capabilities: bool,
}

/// Per-request tuning for [`ProtocolEngine::send_request`]
///
/// [`ProtocolEngine::send_request`]: super::ProtocolEngine::send_request
#[derive(Clone, Default)]
pub struct RequestOptions {
    /// Inactivity timeout; fires when neither a response nor (when reset is
    /// enabled) progress arrives inside the window. `None` uses the 60 s
    /// default.
    pub timeout: Option<Duration>,

    /// Restart the timer whenever a progress notification for this request
    /// arrives
    pub reset_timeout_on_progress: bool,

    /// Absolute cap measured from the moment the request was issued;
    /// progress cannot extend past it
    pub max_total_timeout: Option<Duration>,

    /// Caller-driven cancellation; aborting resolves the request future with
    /// an abort error and emits `notifications/cancelled` best-effort
    pub cancellation: Option<CancellationToken>,

    /// Progress callback; supplying one injects a `progressToken` into the
    /// request's `_meta`
    pub on_progress: Option<ProgressCallback>,
}

impl RequestOptions {
    /// Effective inactivity timeout
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or(defaults::REQUEST_TIMEOUT)
    }

    /// Set the inactivity timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable progress-driven timer reset
    pub fn with_reset_timeout_on_progress(mut self, reset: bool) -> Self {
        self.reset_timeout_on_progress = reset;
        self
    }

    /// Set the absolute timeout cap
    pub fn with_max_total_timeout(mut self, cap: Duration) -> Self {
        self.max_total_timeout = Some(cap);
        self
    }

    /// Attach a cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Attach a progress callback
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("timeout", &self.timeout)
            .field("reset_timeout_on_progress", &self.reset_timeout_on_progress)
            .field("max_total_timeout", &self.max_total_timeout)
            .field("cancellation", &self.cancellation.is_some())
            .field("on_progress", &self.on_progress.as_ref().map(|_| "fn"))
            .finish()
    }
}
