//! Protocol Engine
//!
//! The role-agnostic heart of the runtime: request/response correlation with
//! per-request timeouts, progress-driven timeout extension, cooperative
//! cancellation in both directions, capability gating, and pluggable handler
//! dispatch. The client and server facades are thin wrappers that plug their
//! capability-assertion tables into this engine.
//!
//! ## Module Organization
//!
//! - `capabilities`: the strategy trait the facades implement
//! - `handler`: handler registry and the context handed to request handlers
//! - `options`: engine-wide and per-request tuning knobs
//! - `engine`: the [`ProtocolEngine`] itself

// Module declarations (declarations only in mod.rs)
pub mod capabilities;
pub mod engine;
pub mod handler;
pub mod options;

// Public re-exports
pub use capabilities::{AllowAllCapabilities, CapabilityGate};
pub use engine::ProtocolEngine;
pub use handler::{NotificationHandlerFn, ProgressCallback, RequestHandlerContext, RequestHandlerFn};
pub use options::{EngineOptions, RequestOptions};
