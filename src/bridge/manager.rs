//! Connection manager: the single active peer connection and its status.
//!
//! # State Machine
//!
//! ```text
//!                 on_accept
//!  Disconnected ─────────────► Connected ──┐
//!       ▲                        │   ▲     │ on_accept (supersede:
//!       │  on_close / on_error   │   └─────┘  old one shut down)
//!       └────────────────────────┘
//! ```
//!
//! Every transition away from a connection (close, error, supersede,
//! shutdown) fails all outstanding calls, so no caller waits on a socket
//! that can no longer answer.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, RequestId};
use crate::transport::Connection;

use super::table::{Completion, CorrelationTable};

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Whether a peer is currently available for sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No active connection.
    Disconnected,
    /// A connection is active.
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connected => f.write_str("connected"),
        }
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owns the active connection reference.
///
/// `Connected` is exactly "an active connection is installed"; the status
/// is derived, never stored separately.
pub struct ConnectionManager {
    active: RwLock<Option<Connection>>,
    table: Arc<CorrelationTable>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("status", &self.status())
            .field("active", &self.active_id())
            .field("pending", &self.table.len())
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a disconnected manager that cancels calls in `table`.
    #[must_use]
    pub fn new(table: Arc<CorrelationTable>) -> Self {
        Self {
            active: RwLock::new(None),
            table,
        }
    }

    /// Installs `connection` as the active connection.
    ///
    /// A previously active connection is shut down and the calls sent on it
    /// are failed with [`Error::ConnectionLost`].
    pub fn on_accept(&self, connection: Connection) {
        let id = connection.id();
        let mut active = self.active.write();

        match active.replace(connection) {
            Some(previous) => {
                info!(connection = %id, superseded = %previous.id(), "Peer connection superseded");
                previous.shutdown();
                // Drained under the write lock: every entry here was sent on `previous`.
                self.table.cancel_all("superseded by a new peer connection");
            }
            None => info!(connection = %id, "Peer connected"),
        }
    }

    /// Handles a close of `connection`.
    ///
    /// Ignored unless `connection` is the active one.
    pub fn on_close(&self, connection: ConnectionId) {
        if self.deactivate(connection, "peer connection closed") {
            info!(connection = %connection, "Peer disconnected");
        } else {
            debug!(connection = %connection, "Ignoring close of inactive connection");
        }
    }

    /// Handles a transport failure on `connection`.
    ///
    /// Ignored unless `connection` is the active one.
    pub fn on_error(&self, connection: ConnectionId, error: &Error) {
        let reason = format!("peer connection error: {error}");
        if self.deactivate(connection, &reason) {
            warn!(connection = %connection, error = %error, "Peer connection failed");
        } else {
            debug!(connection = %connection, error = %error, "Ignoring error of inactive connection");
        }
    }

    /// Registers `sink` under `request_id` and queues `text` on the active
    /// connection.
    ///
    /// Both steps run under the read lock, so a concurrent supersede or close
    /// either cancels this call as one sent on the old connection or does not
    /// see it at all. On a failed send the entry is removed again.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if there is no active connection or its
    ///   event loop has already exited
    /// - [`Error::DuplicateRequestId`] or [`Error::TooManyPending`] from the
    ///   table
    pub fn dispatch(&self, request_id: RequestId, sink: Completion, text: String) -> Result<()> {
        let active = self.active.read();
        let Some(connection) = active.as_ref() else {
            return Err(Error::NotConnected);
        };

        self.table.register(request_id.clone(), sink)?;

        if let Err(e) = connection.send(text) {
            self.table.remove(&request_id);
            return Err(e);
        }

        Ok(())
    }

    /// Returns a snapshot of the status.
    ///
    /// May be stale as soon as it is read; a failed [`send`](Self::send) is
    /// authoritative.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        if self.active.read().is_some() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    /// Returns `true` if a connection is active.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Returns the id of the active connection.
    #[inline]
    #[must_use]
    pub fn active_id(&self) -> Option<ConnectionId> {
        self.active.read().as_ref().map(Connection::id)
    }

    /// Closes the active connection and fails all outstanding calls.
    pub fn shutdown(&self) {
        let mut active = self.active.write();
        if let Some(connection) = active.take() {
            info!(connection = %connection.id(), "Closing peer connection");
            connection.shutdown();
        }
        self.table.cancel_all("bridge shut down");
    }

    /// Drops the active reference if it is `connection` and fails its calls
    /// with `reason`.
    ///
    /// Both happen under the write lock, so no call can be dispatched in
    /// between.
    fn deactivate(&self, connection: ConnectionId, reason: &str) -> bool {
        let mut active = self.active.write();
        if active.as_ref().map(Connection::id) != Some(connection) {
            return false;
        }

        *active = None;
        self.table.cancel_all(reason);
        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::oneshot;
    use tokio::sync::oneshot::error::TryRecvError;

    use crate::transport::ConnectionCommand;

    fn manager_with(max_pending: usize) -> (ConnectionManager, Arc<CorrelationTable>) {
        let table = Arc::new(CorrelationTable::new(max_pending));
        (ConnectionManager::new(Arc::clone(&table)), table)
    }

    fn manager() -> (ConnectionManager, Arc<CorrelationTable>) {
        manager_with(16)
    }

    #[test]
    fn test_initially_disconnected() {
        let (manager, _) = manager();
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
        assert!(manager.active_id().is_none());
    }

    #[test]
    fn test_dispatch_while_disconnected() {
        let (manager, table) = manager();
        let (tx, _rx) = oneshot::channel();

        let err = manager.dispatch(RequestId::new("x"), tx, "x".to_string()).unwrap_err();

        assert!(matches!(err, Error::NotConnected));
        assert!(table.is_empty());
    }

    #[test]
    fn test_accept_then_dispatch() {
        let (manager, table) = manager();
        let (connection, mut rx) = Connection::channel();
        let id = connection.id();

        manager.on_accept(connection);
        assert!(manager.is_connected());
        assert_eq!(manager.active_id(), Some(id));

        let (tx, _pending) = oneshot::channel();
        manager
            .dispatch(RequestId::new("a"), tx, "frame".to_string())
            .expect("dispatch");

        assert!(table.contains(&RequestId::new("a")));
        assert_eq!(
            rx.try_recv().expect("queued"),
            ConnectionCommand::Send("frame".to_string())
        );
    }

    #[test]
    fn test_dispatch_send_failure_removes_entry() {
        let (manager, table) = manager();
        let (connection, rx) = Connection::channel();
        manager.on_accept(connection);
        drop(rx);

        let (tx, _pending) = oneshot::channel();
        let err = manager
            .dispatch(RequestId::new("a"), tx, "frame".to_string())
            .unwrap_err();

        assert!(matches!(err, Error::NotConnected));
        assert!(table.is_empty());
    }

    #[test]
    fn test_supersede_keeps_calls_dispatched_on_new_connection() {
        let (manager, table) = manager();
        let (first, _first_rx) = Connection::channel();
        let first_id = first.id();
        manager.on_accept(first);

        let (tx, mut old_call) = oneshot::channel();
        manager
            .dispatch(RequestId::new("old"), tx, "old".to_string())
            .expect("dispatch");

        let (second, mut second_rx) = Connection::channel();
        manager.on_accept(second);

        let (tx, mut new_call) = oneshot::channel();
        manager
            .dispatch(RequestId::new("new"), tx, "new".to_string())
            .expect("dispatch");
        manager.on_close(first_id);

        assert!(matches!(
            old_call.try_recv().expect("delivered"),
            Err(Error::ConnectionLost { .. })
        ));
        assert!(matches!(new_call.try_recv(), Err(TryRecvError::Empty)));
        assert!(table.contains(&RequestId::new("new")));
        assert_eq!(
            second_rx.try_recv().expect("queued"),
            ConnectionCommand::Send("new".to_string())
        );
    }

    #[test]
    fn test_concurrent_supersede_spares_calls_on_new_connection() {
        let (manager, _table) = manager_with(1024);

        std::thread::scope(|s| {
            let acceptor = s.spawn(|| {
                (0..200)
                    .map(|_| {
                        let (connection, rx) = Connection::channel();
                        manager.on_accept(connection);
                        rx
                    })
                    .collect::<Vec<_>>()
            });

            let mut calls = Vec::new();
            for n in 0..500 {
                let id = RequestId::new(format!("r-{n}"));
                let (tx, rx) = oneshot::channel();
                if manager.dispatch(id.clone(), tx, id.to_string()).is_ok() {
                    calls.push((id, rx));
                }
            }

            let receivers = acceptor.join().expect("acceptor");
            let mut last = receivers.into_iter().last().expect("accepted");

            // Every frame queued on the surviving connection is still pending
            while let Ok(ConnectionCommand::Send(text)) = last.try_recv() {
                let (_, call) = calls
                    .iter_mut()
                    .find(|(id, _)| id.as_str() == text)
                    .expect("known call");
                assert!(matches!(call.try_recv(), Err(TryRecvError::Empty)));
            }
        });
    }

    #[test]
    fn test_close_cancels_pending() {
        let (manager, table) = manager();
        let (connection, _rx) = Connection::channel();
        let id = connection.id();
        manager.on_accept(connection);

        let (tx, mut pending) = oneshot::channel();
        table.register(RequestId::new("x"), tx).expect("register");

        manager.on_close(id);

        assert!(!manager.is_connected());
        assert!(table.is_empty());
        let err = pending.try_recv().expect("delivered").unwrap_err();
        assert!(matches!(err, Error::ConnectionLost { .. }));
    }

    #[test]
    fn test_error_cancels_pending() {
        let (manager, table) = manager();
        let (connection, _rx) = Connection::channel();
        let id = connection.id();
        manager.on_accept(connection);

        let (tx, mut pending) = oneshot::channel();
        table.register(RequestId::new("x"), tx).expect("register");

        manager.on_error(id, &Error::connection("reset by peer"));

        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
        let err = pending.try_recv().expect("delivered").unwrap_err();
        assert!(err.to_string().contains("reset by peer"));
    }

    #[test]
    fn test_accept_supersedes_and_closes_previous() {
        let (manager, table) = manager();
        let (first, mut first_rx) = Connection::channel();
        let first_id = first.id();
        manager.on_accept(first);

        let (tx, mut pending) = oneshot::channel();
        table.register(RequestId::new("old"), tx).expect("register");

        let (second, _second_rx) = Connection::channel();
        let second_id = second.id();
        manager.on_accept(second);

        assert_eq!(manager.active_id(), Some(second_id));
        assert_eq!(
            first_rx.try_recv().expect("shutdown queued"),
            ConnectionCommand::Shutdown
        );
        assert!(matches!(
            pending.try_recv().expect("delivered"),
            Err(Error::ConnectionLost { .. })
        ));

        // Late close of the superseded connection must not disturb the new one
        manager.on_close(first_id);
        assert_eq!(manager.active_id(), Some(second_id));
    }

    #[test]
    fn test_shutdown() {
        let (manager, table) = manager();
        let (connection, mut rx) = Connection::channel();
        manager.on_accept(connection);

        let (tx, mut pending) = oneshot::channel();
        table.register(RequestId::new("x"), tx).expect("register");

        manager.shutdown();

        assert!(!manager.is_connected());
        assert_eq!(rx.try_recv().expect("queued"), ConnectionCommand::Shutdown);
        assert!(pending.try_recv().expect("delivered").is_err());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "disconnected");
    }
}
