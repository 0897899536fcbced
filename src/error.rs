//! Error types for the WinCC OA MCP bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use winccoa_mcp::{Bridge, Result};
//!
//! async fn example(bridge: &Bridge) -> Result<String> {
//!     let response = bridge.call(r#"{"type":"GET","url":"..."}"#).await?;
//!     Ok(response)
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Call | [`Error::NotConnected`], [`Error::ConnectionLost`], [`Error::RequestTimeout`] |
//! | Correlation | [`Error::DuplicateRequestId`], [`Error::TooManyPending`] |
//! | Protocol | [`Error::MalformedFrame`] |
//! | Connection | [`Error::Connection`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Call-level failures ([`Error::NotConnected`], [`Error::ConnectionLost`],
/// [`Error::RequestTimeout`]) are returned to the immediate caller only and
/// never tear down the bridge or the peer connection.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when bridge or server configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Call Errors
    // ========================================================================
    /// No peer connection is active.
    ///
    /// Returned when a call is made before a peer has connected, after it
    /// disconnected, or when the send itself finds the connection gone.
    #[error("Peer not connected")]
    NotConnected,

    /// The peer connection dropped while the call was outstanding.
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// Why the connection went away.
        reason: String,
    },

    /// No response arrived within the call timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Correlation Errors
    // ========================================================================
    /// A request ID was registered while an identical one was outstanding.
    #[error("Duplicate request id: {request_id}")]
    DuplicateRequestId {
        /// The colliding request ID.
        request_id: RequestId,
    },

    /// Too many calls are awaiting responses.
    #[error("Too many pending requests (limit {limit})")]
    TooManyPending {
        /// The configured limit.
        limit: usize,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Inbound bytes do not have the response frame shape.
    ///
    /// Handled inside the bridge by dropping the frame.
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// Parser diagnostic.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection could not be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection lost error.
    #[inline]
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a duplicate request id error.
    #[inline]
    pub fn duplicate_request_id(request_id: RequestId) -> Self {
        Self::DuplicateRequestId { request_id }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::ConnectionLost { .. }
                | Self::Connection { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry, typically once a peer
    /// (re)connects or the backlog of pending calls drains.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::ConnectionLost { .. }
                | Self::RequestTimeout { .. }
                | Self::TooManyPending { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
