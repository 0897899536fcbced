//! The correlation bridge: outbound calls and inbound frame routing.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use winccoa_mcp::{Bridge, Config};
//!
//! # async fn example() -> winccoa_mcp::Result<()> {
//! let bridge = Arc::new(Bridge::new(&Config::default()));
//!
//! // Once a peer has connected:
//! let response = bridge.call(r#"{"type":"GET","url":"http://localhost:3000/datapoints"}"#).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, IdGenerator, RequestId, SequentialIdGenerator};
use crate::protocol::{RequestFrame, ResponseFrame};
use crate::transport::{Connection, ConnectionEvents};

use super::manager::ConnectionManager;
use super::table::CorrelationTable;

// ============================================================================
// RemoteCall
// ============================================================================

/// Something that can forward an opaque payload to the peer and return its
/// opaque response.
///
/// The tool adapter depends on this rather than on [`Bridge`] directly.
#[async_trait]
pub trait RemoteCall: Send + Sync {
    /// Sends `payload` and waits for the matching response.
    async fn request(&self, payload: String) -> Result<String>;
}

// ============================================================================
// FrameOutcome
// ============================================================================

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Delivered to a waiting caller.
    Matched,
    /// Well-formed, but no call with that id is outstanding.
    Unmatched,
    /// Not a response frame; dropped.
    Malformed,
}

// ============================================================================
// Bridge
// ============================================================================

/// Correlates outbound calls with inbound responses over the active peer
/// connection.
///
/// Share it as `Arc<Bridge>`: the transport drives it through
/// [`ConnectionEvents`], tool handlers call [`call`](Self::call).
pub struct Bridge {
    ids: Box<dyn IdGenerator>,
    table: Arc<CorrelationTable>,
    manager: ConnectionManager,
    request_timeout: Option<Duration>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("manager", &self.manager)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Bridge - Constructor
// ============================================================================

impl Bridge {
    /// Creates a disconnected bridge using [`SequentialIdGenerator`] ids.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_id_generator(config, SequentialIdGenerator::new())
    }

    /// Creates a disconnected bridge with a custom id source.
    #[must_use]
    pub fn with_id_generator(config: &Config, ids: impl IdGenerator + 'static) -> Self {
        let table = Arc::new(CorrelationTable::new(config.max_pending));
        let manager = ConnectionManager::new(Arc::clone(&table));

        Self {
            ids: Box::new(ids),
            table,
            manager,
            request_timeout: config.request_timeout,
        }
    }
}

// ============================================================================
// Bridge - Public API
// ============================================================================

impl Bridge {
    /// Sends `payload` to the peer and waits for its response, using the
    /// configured default timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no peer is connected, or the connection
    ///   dropped before the request could be queued
    /// - [`Error::ConnectionLost`] if the connection dropped while waiting
    /// - [`Error::RequestTimeout`] if the timeout elapsed
    /// - [`Error::TooManyPending`] if too many calls are outstanding
    pub async fn call(&self, payload: impl Into<String>) -> Result<String> {
        self.call_with_timeout(payload, self.request_timeout).await
    }

    /// Like [`call`](Self::call) with an explicit timeout; `None` waits
    /// until a response arrives or the connection drops.
    ///
    /// Dropping the returned future abandons the call and removes its entry.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn call_with_timeout(
        &self,
        payload: impl Into<String>,
        request_timeout: Option<Duration>,
    ) -> Result<String> {
        if !self.manager.is_connected() {
            debug!("Call rejected: peer not connected");
            return Err(Error::NotConnected);
        }

        let request_id = self.ids.next_id();
        let text = RequestFrame::new(request_id.clone(), payload).to_text()?;
        let (response_tx, response_rx) = oneshot::channel();

        if let Err(e) = self.manager.dispatch(request_id.clone(), response_tx, text) {
            debug!(request_id = %request_id, error = %e, "Dispatch failed");
            return Err(e);
        }
        let guard = PendingGuard::new(&self.table, request_id.clone());

        trace!(request_id = %request_id, "Request sent");

        let received = match request_timeout {
            Some(limit) => match timeout(limit, response_rx).await {
                Ok(received) => received,
                Err(_) => {
                    debug!(request_id = %request_id, "Request timed out");
                    // guard removes the entry
                    return Err(Error::request_timeout(
                        request_id,
                        limit.as_millis() as u64,
                    ));
                }
            },
            None => response_rx.await,
        };

        // Whoever resolved the sink already removed the entry.
        guard.disarm();

        match received {
            Ok(result) => result,
            Err(_) => Err(Error::connection_lost("completion dropped")),
        }
    }

    /// Routes one inbound frame to its waiting caller.
    ///
    /// Never fails: malformed and unmatched frames are logged and dropped.
    pub fn handle_frame(&self, text: &str) -> FrameOutcome {
        let frame = match ResponseFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Dropping malformed frame");
                return FrameOutcome::Malformed;
            }
        };

        if self.table.complete(&frame.id, frame.response) {
            trace!(request_id = %frame.id, "Response delivered");
            FrameOutcome::Matched
        } else {
            debug!(request_id = %frame.id, "Response for unknown request");
            FrameOutcome::Unmatched
        }
    }

    /// Returns `true` if a peer is connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Returns the id of the active connection.
    #[inline]
    #[must_use]
    pub fn active_connection(&self) -> Option<ConnectionId> {
        self.manager.active_id()
    }

    /// Returns the number of outstanding calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.table.len()
    }

    /// Returns the default per-call timeout.
    #[inline]
    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Closes the active connection and fails all outstanding calls.
    pub fn shutdown(&self) {
        self.manager.shutdown();
    }
}

// ============================================================================
// Bridge - Transport Hooks
// ============================================================================

impl ConnectionEvents for Bridge {
    fn on_accept(&self, connection: Connection) {
        self.manager.on_accept(connection);
    }

    fn on_message(&self, connection: ConnectionId, text: &str) {
        if self.manager.active_id() != Some(connection) {
            debug!(connection = %connection, "Dropping frame from inactive connection");
            return;
        }
        self.handle_frame(text);
    }

    fn on_close(&self, connection: ConnectionId) {
        self.manager.on_close(connection);
    }

    fn on_error(&self, connection: ConnectionId, error: &Error) {
        self.manager.on_error(connection, error);
    }
}

#[async_trait]
impl RemoteCall for Bridge {
    async fn request(&self, payload: String) -> Result<String> {
        self.call(payload).await
    }
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Removes a table entry when a call is abandoned midway.
struct PendingGuard<'a> {
    table: &'a CorrelationTable,
    request_id: Option<RequestId>,
}

impl<'a> PendingGuard<'a> {
    fn new(table: &'a CorrelationTable, request_id: RequestId) -> Self {
        Self {
            table,
            request_id: Some(request_id),
        }
    }

    fn disarm(mut self) {
        self.request_id = None;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(request_id) = self.request_id.take()
            && self.table.remove(&request_id)
        {
            debug!(request_id = %request_id, "Removed abandoned correlation");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
