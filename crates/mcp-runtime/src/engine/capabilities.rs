//! Capability Gating Strategy
//!
//! The engine is role-agnostic; what a given peer may send or handle is
//! decided by a [`CapabilityGate`] supplied at construction. The client and
//! server facades each provide an implementation backed by the capability
//! bundles exchanged during initialization.
//!
//! Gate failures are local policy violations: they are raised to the caller
//! before the wire is touched and are never emitted as error responses.

// Layer 3: Internal module imports
use crate::protocol::McpResult;

/// Strategy trait filling in the three capability assertion hooks
pub trait CapabilityGate: Send + Sync {
    /// May we *send* a request with this method to the peer?
    ///
    /// Consulted before every outbound request when the engine runs with
    /// `enforce_strict_capabilities`.
    fn assert_capability_for_method(&self, method: &str) -> McpResult<()>;

    /// May we *send* a notification with this method to the peer?
    fn assert_notification_capability(&self, method: &str) -> McpResult<()>;

    /// May we *handle* inbound requests with this method?
    ///
    /// Consulted when a request handler is registered.
    fn assert_request_handler_capability(&self, method: &str) -> McpResult<()>;
}

/// Gate that permits everything; used by tests and raw engine embedders
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllCapabilities;

impl CapabilityGate for AllowAllCapabilities {
    fn assert_capability_for_method(&self, _method: &str) -> McpResult<()> {
        Ok(())
    }

    fn assert_notification_capability(&self, _method: &str) -> McpResult<()> {
        Ok(())
    }

    fn assert_request_handler_capability(&self, _method: &str) -> McpResult<()> {
        Ok(())
    }
}
