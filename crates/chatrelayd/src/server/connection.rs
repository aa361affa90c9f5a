//! Connection handler for individual client connections.
//!
//! Each accepted connection gets its own `ConnectionHandler` task that:
//! - Sends the nickname request and reads the reply
//! - Registers the connection and announces the join
//! - Relays every message unit it reads to all registered connections
//! - Removes itself and announces the departure on EOF, error or shutdown
//!
//! ```text
//! Accepted ──▶ AwaitingNickname ──▶ Active ──▶ Closed
//!                    │                            ▲
//!                    └──── rejected handshake ────┘
//! ```
//!
//! Message units are whatever one `read` returns. There is no framing, so a
//! peer whose writes are split or coalesced by the transport will see them
//! relayed with the same boundaries the relay happened to read.

use std::net::SocketAddr;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatrelay_protocol::{
    connected_ack, join_notice, leave_notice, parse_nickname, HandshakeError, NICK_REQUEST,
};

use crate::fanout::Broadcaster;
use crate::peer::{ConnectionId, Peer};
use crate::registry::{RegistryError, RegistryHandle, RelayEvent, RemovalReason};

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport open, nickname request not yet sent
    Accepted,
    /// Waiting for the nickname reply
    AwaitingNickname,
    /// Registered and relaying
    Active,
    /// Torn down
    Closed,
}

/// Connection handler for a single client.
pub struct ConnectionHandler {
    /// Shareable half: writer and force-close token
    peer: Peer,

    /// Read half, owned exclusively by this handler
    reader: OwnedReadHalf,

    /// One message unit is one read into this buffer
    buf: Vec<u8>,

    registry: RegistryHandle,

    broadcaster: Broadcaster,

    state: ConnectionState,
}

impl ConnectionHandler {
    /// Creates a handler for a freshly accepted stream.
    ///
    /// `closer` force-closes the connection when cancelled; the server
    /// passes a child of its shutdown token.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        id: ConnectionId,
        registry: RegistryHandle,
        closer: CancellationToken,
        read_buffer_size: usize,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            peer: Peer::new(id, addr, writer, closer),
            reader,
            buf: vec![0; read_buffer_size.max(1)],
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            state: ConnectionState::Accepted,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs the connection to completion.
    ///
    /// Returns the registered nickname, or `None` if the handshake or
    /// registration failed.
    pub async fn run(mut self) -> Option<String> {
        let id = self.peer.id();
        let addr = self.peer.addr();
        debug!(connection = %id, addr = %addr, "New client connected");
        self.registry.publish(RelayEvent::Connected { id, addr });

        let name = match self.handshake().await {
            Ok(name) => name,
            Err(e) => {
                warn!(connection = %id, addr = %addr, error = %e, "Handshake failed");
                self.registry.publish(RelayEvent::HandshakeRejected {
                    id,
                    addr,
                    reason: e.to_string(),
                });
                self.abort().await;
                return None;
            }
        };

        if let Err(e) = self.register(&name).await {
            warn!(connection = %id, name = %name, error = %e, "Registration failed");
            self.abort().await;
            return None;
        }

        self.broadcaster.broadcast(join_notice(&name), Some(id)).await;
        if let Err(e) = self.peer.send(&connected_ack()).await {
            // The read loop below notices the dead transport
            debug!(connection = %id, error = %e, "Failed to send acknowledgment");
        }

        match self.relay_messages().await {
            Ok(()) => debug!(connection = %id, "Client closed connection"),
            Err(e) => debug!(connection = %id, error = %e, "Connection ended"),
        }

        self.teardown().await;
        Some(name)
    }

    /// Sends the nickname request and validates the reply.
    async fn handshake(&mut self) -> Result<String, ConnectionError> {
        self.peer
            .send(NICK_REQUEST)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;
        self.state = ConnectionState::AwaitingNickname;

        let n = self.read_unit().await?;
        let name = parse_nickname(&self.buf[..n])?;
        Ok(name)
    }

    /// Inserts this connection into the registry and goes `Active`.
    async fn register(&mut self, name: &str) -> Result<(), ConnectionError> {
        self.registry
            .register(self.peer.clone(), name.to_string())
            .await?;
        self.state = ConnectionState::Active;
        Ok(())
    }

    /// Relays message units until EOF, error or force-close.
    ///
    /// A clean EOF is `Ok`. Relay does not exclude the sender.
    async fn relay_messages(&mut self) -> Result<(), ConnectionError> {
        loop {
            let n = match self.read_unit().await {
                Ok(n) => n,
                Err(ConnectionError::ClosedByPeer) => return Ok(()),
                Err(e) => return Err(e),
            };

            let unit = self.buf[..n].to_vec();
            self.broadcaster.broadcast(unit, None).await;
        }
    }

    /// Reads one message unit into `buf`, returning its length.
    async fn read_unit(&mut self) -> Result<usize, ConnectionError> {
        tokio::select! {
            biased;

            _ = self.peer.closed() => Err(ConnectionError::Cancelled),

            result = self.reader.read(&mut self.buf) => match result {
                Ok(0) => Err(ConnectionError::ClosedByPeer),
                Ok(n) => Ok(n),
                Err(e) => Err(ConnectionError::Io(e.to_string())),
            },
        }
    }

    /// Closes a connection that never made it into the registry.
    async fn abort(&mut self) {
        self.state = ConnectionState::Closed;
        self.peer.close().await;
    }

    /// Deregisters, closes and announces the departure.
    ///
    /// If a failed broadcast already removed this connection, the
    /// broadcaster has announced it and this only closes the transport.
    async fn teardown(&mut self) {
        self.state = ConnectionState::Closed;

        match self
            .registry
            .remove(self.peer.id(), RemovalReason::Disconnected)
            .await
        {
            Some(entry) => {
                entry.peer.close().await;
                info!(connection = %entry.id(), name = %entry.name, "Client left");
                self.broadcaster
                    .broadcast(leave_notice(&entry.name), None)
                    .await;
            }
            None => self.peer.close().await,
        }
    }
}

/// Errors that end a connection.
///
/// None of these leave the connection's own task.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Handshake rejected: {0}")]
    HandshakeRejected(#[from] HandshakeError),

    #[error("Connection closed by peer")]
    ClosedByPeer,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed by server")]
    Cancelled,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
