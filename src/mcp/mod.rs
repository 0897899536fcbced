//! MCP front end.
//!
//! The outer protocol the MCP client speaks. Tool handlers here are the only
//! callers of the bridge.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `jsonrpc` | JSON-RPC 2.0 envelopes |
//! | `server` | Request dispatch (`initialize`, `tools/list`, `tools/call`, ...) |
//! | `stdio` | Line-delimited stdin/stdout transport |
//! | `tools` | Datapoint tools |

// ============================================================================
// Submodules
// ============================================================================

/// JSON-RPC 2.0 envelopes.
pub mod jsonrpc;

/// MCP request handler.
pub mod server;

/// stdin/stdout transport.
pub mod stdio;

/// Datapoint tools.
pub mod tools;

// ============================================================================
// Re-exports
// ============================================================================

pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::McpServer;
pub use stdio::serve_stdio;
pub use tools::{DatapointTools, ToolError};
