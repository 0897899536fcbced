//! WebSocket protocol message types.
//!
//! This module defines the frames exchanged between the bridge (local end)
//! and the WinCC OA peer (remote end).
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `RequestFrame` | Local → Remote | Call with opaque `message` payload |
//! | `ResponseFrame` | Remote → Local | Opaque `response` for a request id |
//!
//! The `message` carried by a request is itself a serialized [`Query`];
//! the bridge never looks inside it.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `query` | Inner payload sent to the peer |
//! | `request` | Request and response frames |

// ============================================================================
// Submodules
// ============================================================================

/// Inner payload understood by the peer.
pub mod query;

/// Request and response frame types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use query::{Query, QueryMethod};
pub use request::{RequestFrame, ResponseFrame};
