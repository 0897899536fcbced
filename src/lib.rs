//! WinCC OA MCP bridge.
//!
//! Exposes MCP tools whose work is done by a WinCC OA peer process that
//! connects to this server over WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  stdio   ┌────────────────────────────┐  WebSocket  ┌──────────────┐
//! │ MCP client │◄────────►│ McpServer → DatapointTools │◄───────────►│ WinCC OA peer│
//! └────────────┘          │            → Bridge        │  {id, ...}  └──────────────┘
//!                         └────────────────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - One active peer connection; a new peer supersedes (and closes) the old
//! - Every call carries a unique id; responses are matched by id only
//! - A disconnect fails every outstanding call instead of leaving it hanging
//! - Backend failures become "data unavailable" text, never protocol errors
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use winccoa_mcp::{Bridge, Config, Result};
//! use winccoa_mcp::mcp::{DatapointTools, McpServer, serve_stdio};
//! use winccoa_mcp::transport::PeerServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::builder().port(9151).build()?;
//!     let bridge = Arc::new(Bridge::new(&config));
//!
//!     let server = PeerServer::bind(config.bind_ip, config.port).await?;
//!     let peers = server.serve(bridge.clone());
//!
//!     let tools = DatapointTools::new(bridge.clone(), config.api_base.clone());
//!     serve_stdio(Arc::new(McpServer::new(tools))).await?;
//!
//!     peers.shutdown().await;
//!     bridge.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Correlation bridge: [`Bridge`], connection manager, table |
//! | [`config`] | [`Config`] and its builder |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Request/connection ids and id generators |
//! | [`mcp`] | MCP request handling, tools and stdio transport |
//! | [`protocol`] | WebSocket frame types |
//! | [`transport`] | WebSocket server and connection event loop |

// ============================================================================
// Modules
// ============================================================================

/// Correlation bridge.
///
/// - [`Bridge`] - Call surface and inbound frame handler
/// - [`bridge::ConnectionManager`] - Active connection and status
/// - [`bridge::CorrelationTable`] - Outstanding calls
pub mod bridge;

/// Runtime configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers and id generation.
pub mod identifiers;

/// MCP front end.
pub mod mcp;

/// WebSocket protocol message types.
pub mod protocol;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{Bridge, ConnectionStatus, FrameOutcome, RemoteCall};

// Configuration
pub use config::{Config, ConfigBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{
    ConnectionId, IdGenerator, RequestId, SequentialIdGenerator, UuidIdGenerator,
};
