//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` is cheap to clone and is shared by the accept loop,
//! every connection handler and the broadcaster.
//!
//! # Panic-Free Guarantees
//!
//! Channel errors are mapped to `RegistryError::ChannelClosed` or to an
//! empty result; nothing here panics.

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::peer::{ConnectionId, Peer};

use super::commands::{RegistryCommand, RegistryEntry, RegistryError, RelayEvent, RemovalReason};

/// Handle for interacting with the registry actor.
///
/// # Usage
///
/// ```ignore
/// handle.register(peer, "alice".to_string()).await?;
///
/// for entry in handle.snapshot().await {
///     entry.peer.send(b"hello").await?;
/// }
///
/// let mut events = handle.subscribe();
/// while let Ok(event) = events.recv().await {
///     // Handle event
/// }
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Lifecycle event broadcaster
    event_sender: broadcast::Sender<RelayEvent>,
}

impl RegistryHandle {
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<RelayEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Register a connection under a display name.
    ///
    /// The entry is visible to every later `snapshot` once this returns.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AlreadyRegistered` if the connection is present
    /// - `RegistryError::ShuttingDown` after `drain`
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(&self, peer: Peer, name: String) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register {
                peer,
                name,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove a connection, returning its entry if it was still present.
    ///
    /// Concurrent callers racing to remove the same connection see exactly
    /// one `Some`. Returns `None` as well if the actor is gone.
    pub async fn remove(&self, id: ConnectionId, reason: RemovalReason) -> Option<RegistryEntry> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Remove {
                id,
                reason,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Point-in-time copy of all entries in registration order.
    ///
    /// The copy is detached from the registry, so callers may do slow I/O
    /// over it without blocking registrations.
    pub async fn snapshot(&self) -> Vec<RegistryEntry> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Empty the registry and refuse all further registrations.
    ///
    /// Returns the removed entries; closing their transports is the
    /// caller's job.
    pub async fn drain(&self) -> Vec<RegistryEntry> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Drain { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Number of registered connections (0 if the actor is gone).
    pub async fn len(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Count { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Subscribe to lifecycle events.
    ///
    /// This is a synchronous operation - it doesn't communicate with the actor.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.event_sender.subscribe()
    }

    /// Publish a lifecycle event that did not originate in the actor
    /// (accept, handshake rejection, shutdown).
    pub fn publish(&self, event: RelayEvent) {
        // No subscribers is fine
        let _ = self.event_sender.send(event);
    }
}
