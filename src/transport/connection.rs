//! Peer connection handle and WebSocket event loop.
//!
//! A [`Connection`] is a cheap, cloneable handle to one accepted peer. Text
//! handed to [`Connection::send`] is queued to the connection's event loop,
//! which owns the socket and writes it out. Everything the loop observes is
//! reported through [`ConnectionEvents`].
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming frames from the peer (forwarded to `on_message`)
//! - Outgoing frames queued by callers
//! - Close and error detection (forwarded to `on_close` / `on_error`)

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

// ============================================================================
// ConnectionEvents
// ============================================================================

/// Hooks the transport layer drives for every peer connection.
///
/// Implemented by [`Bridge`](crate::Bridge); custom transports can call these
/// directly after creating a handle with [`Connection::channel`].
pub trait ConnectionEvents: Send + Sync + 'static {
    /// A new peer connection is ready for sending.
    fn on_accept(&self, connection: Connection);

    /// A frame arrived on `connection`.
    fn on_message(&self, connection: ConnectionId, text: &str);

    /// `connection` was closed by either side.
    fn on_close(&self, connection: ConnectionId);

    /// `connection` failed with `error` and is no longer usable.
    fn on_error(&self, connection: ConnectionId, error: &Error);
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Commands consumed by a connection's writer side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCommand {
    /// Write one text frame.
    Send(String),
    /// Close the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to one peer connection.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cloning it shares the same underlying
/// socket. Sending never waits for the write to complete.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Process-unique id.
    id: ConnectionId,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl Connection {
    /// Creates a handle together with the receiving end of its command queue.
    ///
    /// The caller becomes the transport: it must drain the receiver and put
    /// each [`ConnectionCommand::Send`] on the wire.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ConnectionCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connection = Self {
            id: ConnectionId::next(),
            command_tx,
        };
        (connection, command_rx)
    }

    /// Wraps an upgraded WebSocket, announces it through `events.on_accept`
    /// and spawns its event loop.
    pub fn spawn<S>(ws_stream: WebSocketStream<S>, events: Arc<dyn ConnectionEvents>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (connection, command_rx) = Self::channel();

        // Register before reading so no inbound frame can beat the accept.
        events.on_accept(connection.clone());

        tokio::spawn(run_event_loop(connection.id, ws_stream, command_rx, events));

        connection
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues one text frame for the peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the event loop has already exited.
    pub fn send(&self, text: String) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Send(text))
            .map_err(|_| Error::NotConnected)
    }

    /// Asks the event loop to close the socket.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Returns `true` once the event loop has stopped accepting commands.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Event loop that handles WebSocket I/O for one connection.
async fn run_event_loop<S>(
    id: ConnectionId,
    ws_stream: WebSocketStream<S>,
    mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    events: Arc<dyn ConnectionEvents>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let failure: Option<Error> = loop {
        tokio::select! {
            // Incoming frames from the peer
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        events.on_message(id, text.as_str());
                    }

                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => events.on_message(id, text),
                        Err(e) => warn!(connection = %id, error = %e, "Dropping non-UTF-8 binary frame"),
                    },

                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %id, "WebSocket closed by peer");
                        break None;
                    }

                    Some(Err(e)) => {
                        error!(connection = %id, error = %e, "WebSocket error");
                        break Some(Error::WebSocket(e));
                    }

                    None => {
                        debug!(connection = %id, "WebSocket stream ended");
                        break None;
                    }

                    // Ignore Ping, Pong, Frame
                    _ => {}
                }
            }

            // Frames queued by callers
            command = command_rx.recv() => {
                match command {
                    Some(ConnectionCommand::Send(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(connection = %id, error = %e, "Failed to write frame");
                            break Some(Error::WebSocket(e));
                        }
                        trace!(connection = %id, "Frame sent");
                    }

                    Some(ConnectionCommand::Shutdown) => {
                        debug!(connection = %id, "Shutdown command received");
                        let _ = ws_write.close().await;
                        break None;
                    }

                    None => {
                        debug!(connection = %id, "All handles dropped");
                        let _ = ws_write.close().await;
                        break None;
                    }
                }
            }
        }
    };

    // Refuse further sends before reporting, so a racing caller fails fast.
    command_rx.close();

    match failure {
        Some(e) => events.on_error(id, &e),
        None => events.on_close(id),
    }

    debug!(connection = %id, "Event loop terminated");
}

// ============================================================================
// Tests
// ============================================================================
