//! TCP relay server.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Spawns a ConnectionHandler task for each client
//! - On shutdown, drains the registry, closes every client transport and
//!   finally the listening socket
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │◀──── ShutdownHandle::shutdown()
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ broadcast
//!         ▼
//! ┌─────────────────┐
//! │  Other clients  │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Accept errors are logged and the loop keeps going; only a shutdown
//! request ends it.

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, ConnectionState};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::peer::ConnectionId;
use crate::registry::{RegistryHandle, RelayEvent};

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Requests server shutdown. Cheap to clone and idempotent.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Stops accepting and force-closes every connection.
    ///
    /// Calling it again, or from several tasks at once, has no further
    /// effect.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown requested");
        }
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// TCP relay server: accept loop plus lifecycle control.
pub struct RelayServer {
    listener: TcpListener,

    local_addr: SocketAddr,

    config: RelayConfig,

    registry: RegistryHandle,

    /// Cancelled on shutdown; every connection holds a child token
    cancel_token: CancellationToken,

    /// Source of connection ids
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// `ServerError::Bind` if the address is unavailable.
    pub async fn bind(
        config: RelayConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                error: e.to_string(),
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::LocalAddr(e.to_string()))?;

        info!(addr = %local_addr, "Relay server listening");

        Ok(Self {
            listener,
            local_addr,
            config,
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Binds and runs until shutdown.
    pub async fn start(
        config: RelayConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<(), ServerError> {
        Self::bind(config, registry, cancel_token).await?.run().await
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.cancel_token.clone())
    }

    /// Runs the accept loop.
    ///
    /// Does not return until shutdown is requested. Client transports are
    /// closed before the listening socket.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Shutting down");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let raw = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, addr, ConnectionId::new(raw));
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        self.close_connections().await;

        drop(self.listener);
        self.registry.publish(RelayEvent::Stopped);
        info!(addr = %self.local_addr, "Server stopped");
        Ok(())
    }

    /// Spawns a handler task; never waits for the handshake.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, id: ConnectionId) {
        info!(connection = %id, addr = %addr, "Connection accepted");

        let handler = ConnectionHandler::new(
            stream,
            addr,
            id,
            self.registry.clone(),
            self.cancel_token.child_token(),
            self.config.read_buffer_size,
        );

        tokio::spawn(async move {
            if let Some(name) = handler.run().await {
                debug!(connection = %id, name = %name, "Handler finished");
            }
        });
    }

    /// Drains the registry and closes every registered transport.
    async fn close_connections(&self) {
        let connections = self.registry.len().await;
        self.registry
            .publish(RelayEvent::ShutdownStarted { connections });

        let drained = self.registry.drain().await;
        for entry in &drained {
            entry.peer.close().await;
        }

        info!(closed = drained.len(), "Client connections closed");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },

    #[error("Failed to read local address: {0}")]
    LocalAddr(String),
}
