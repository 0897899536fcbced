//! Correlation bridge.
//!
//! Turns "send a payload, get the answer" into a suspending call over a
//! single shared peer connection.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bridge`] | Public call surface and inbound frame handler |
//! | [`ConnectionManager`] | Active connection reference and status |
//! | [`CorrelationTable`] | Outstanding calls keyed by request id |
//!
//! # Control Flow
//!
//! ```text
//! call(payload)
//!   ├─ NotConnected?  → fail fast
//!   ├─ id = next_id()
//!   ├─ manager.dispatch(id, sink, {id, message})
//!   │     register + send under the connection read lock
//!   │     (send failure → remove, NotConnected)
//!   └─ await sink                    (timeout → remove, RequestTimeout)
//!
//! on_message(text)
//!   └─ parse {id, response} → table.complete(id, response)
//!
//! on_accept (supersede) / on_close / on_error
//!   └─ under the connection write lock → table.cancel_all(ConnectionLost)
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Bridge call surface.
pub mod core;

/// Active connection and status transitions.
pub mod manager;

/// Outstanding call table.
pub mod table;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Bridge, FrameOutcome, RemoteCall};
pub use manager::{ConnectionManager, ConnectionStatus};
pub use table::{Completion, CorrelationTable};
