//! WebSocket transport layer.
//!
//! This module handles communication between the bridge (local end) and the
//! WinCC OA peer (remote end) via WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Bridge (Rust)  │                              │  WinCC OA peer  │
//! │                 │         WebSocket            │                 │
//! │  PeerServer     │◄────────────────────────────►│  WebSocket      │
//! │  → Connection   │      127.0.0.1:9151          │  Client         │
//! │                 │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `PeerServer::bind` - Bind to the configured address
//! 2. `PeerServer::serve` - Accept peers in the background
//! 3. `Connection::spawn` - Announce the peer via `ConnectionEvents::on_accept`
//! 4. Event loop - Forward frames, report close/error
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection handle, event hooks and event loop |
//! | `server` | WebSocket server binding and accept loop |

// ============================================================================
// Submodules
// ============================================================================

/// Connection handle, event hooks and event loop.
pub mod connection;

/// WebSocket server for the WinCC OA peer.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionCommand, ConnectionEvents};
pub use server::{PeerServer, ServerHandle};
