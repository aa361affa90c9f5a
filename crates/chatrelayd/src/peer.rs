//! Registered peer handles.
//!
//! A `Peer` is the shareable half of one client connection: its identity,
//! its remote address, the write half of the socket and a token that
//! force-closes the connection. The read half stays with the connection's
//! own handler task.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

/// Identity of one accepted connection.
///
/// Registry entries are looked up by this, never by display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Type alias for the shared socket writer
pub type PeerWriter = Arc<Mutex<OwnedWriteHalf>>;

/// Cheap-to-clone handle to a connected client.
#[derive(Debug, Clone)]
pub struct Peer {
    id: ConnectionId,
    addr: SocketAddr,
    writer: PeerWriter,
    closer: CancellationToken,
}

impl Peer {
    /// Creates a peer handle.
    ///
    /// `closer` is cancelled when the connection is force-closed; the
    /// handler owning the read half watches it.
    pub fn new(
        id: ConnectionId,
        addr: SocketAddr,
        writer: OwnedWriteHalf,
        closer: CancellationToken,
    ) -> Self {
        Self {
            id,
            addr,
            writer: Arc::new(Mutex::new(writer)),
            closer,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Writes `payload` verbatim. No framing is added.
    ///
    /// The writer lock is held for the whole unit so concurrent
    /// broadcasts never interleave bytes within one peer's stream. A
    /// force-close aborts a write stuck on a peer that stopped reading.
    pub async fn send(&self, payload: &[u8]) -> io::Result<()> {
        let closed = || io::Error::new(io::ErrorKind::NotConnected, "connection already closed");
        if self.closer.is_cancelled() {
            return Err(closed());
        }

        tokio::select! {
            biased;

            _ = self.closer.cancelled() => Err(closed()),

            result = async {
                let mut writer = self.writer.lock().await;
                writer.write_all(payload).await?;
                writer.flush().await
            } => result,
        }
    }

    /// Closes the connection. Safe to call more than once.
    ///
    /// Cancels the handler's read and sends FIN to the remote side.
    pub async fn close(&self) {
        self.closer.cancel();

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!(connection = %self.id, error = %e, "Socket shutdown failed");
        }
    }

    /// Returns true once `close` has been called or the server shut down.
    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }

    /// Resolves when the connection is force-closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closer.cancelled()
    }
}
