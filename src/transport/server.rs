//! WebSocket server the WinCC OA peer connects to.
//!
//! # Connection Flow
//!
//! 1. [`PeerServer::bind`] binds to the configured address (port 0 = random)
//! 2. [`PeerServer::serve`] spawns the accept loop
//! 3. Each TCP connection is upgraded to WebSocket
//! 4. The upgraded socket becomes the active [`Connection`], superseding
//!    any previous one

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

use super::connection::{Connection, ConnectionEvents};

// ============================================================================
// Constants
// ============================================================================

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// PeerServer
// ============================================================================

/// A bound WebSocket server that has not started accepting yet.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use std::sync::Arc;
/// use winccoa_mcp::{Bridge, Config};
/// use winccoa_mcp::transport::PeerServer;
///
/// let bridge = Arc::new(Bridge::new(&Config::default()));
/// let server = PeerServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 9151).await?;
/// let handle = server.serve(bridge);
/// // ...
/// handle.shutdown().await;
/// ```
pub struct PeerServer {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Address actually bound.
    local_addr: SocketAddr,
}

impl PeerServer {
    /// Binds the server to `ip:port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let local_addr = listener.local_addr()?;

        debug!(%local_addr, "Peer WebSocket server bound");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the bound socket address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL peers should connect to.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Starts the accept loop, reporting every connection to `events`.
    #[must_use]
    pub fn serve(self, events: Arc<dyn ConnectionEvents>) -> ServerHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let local_addr = self.local_addr;

        let task = tokio::spawn(accept_loop(self.listener, events, Arc::clone(&shutdown)));

        info!(%local_addr, "Peer WebSocket server started");

        ServerHandle {
            local_addr,
            shutdown,
            task,
        }
    }
}

// ============================================================================
// ServerHandle
// ============================================================================

/// Handle to a running [`PeerServer`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Returns the bound socket address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL peers should connect to.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Stops accepting new peers and waits for the accept loop to exit.
    ///
    /// The active connection is left to its owner; call
    /// [`Bridge::shutdown`](crate::Bridge::shutdown) to close it.
    pub async fn shutdown(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Accept loop task failed");
        }
        info!(local_addr = %self.local_addr, "Peer WebSocket server stopped");
    }
}

// ============================================================================
// Accept Loop
// ============================================================================

/// Background task that accepts new connections.
async fn accept_loop(
    listener: TcpListener,
    events: Arc<dyn ConnectionEvents>,
    shutdown: Arc<AtomicBool>,
) {
    debug!("Accept loop started");

    loop {
        if shutdown.load(Ordering::SeqCst) {
            debug!("Accept loop shutting down");
            break;
        }

        // Accept with timeout to allow checking shutdown flag
        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, addr))) => {
                let events = Arc::clone(&events);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, events).await {
                        warn!(error = %e, ?addr, "Connection handling failed");
                    }
                });
            }
            Ok(Err(e)) => {
                error!(error = %e, "Accept failed");
            }
            Err(_) => continue,
        }
    }

    debug!("Accept loop terminated");
}

/// Upgrades one TCP connection and hands it to `events`.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events: Arc<dyn ConnectionEvents>,
) -> Result<()> {
    debug!(?addr, "New TCP connection");

    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

    let connection = Connection::spawn(ws_stream, events);

    info!(connection = %connection.id(), ?addr, "Peer connected");

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
