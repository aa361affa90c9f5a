//! Registry actor - owns all connection entries and processes commands.
//!
//! The actor runs in a single task; all state mutations happen there, so
//! removal is naturally idempotent: whichever `Remove` arrives first takes
//! the entry and every later one finds nothing.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use crate::peer::{ConnectionId, Peer};

use super::commands::{RegistryCommand, RegistryEntry, RegistryError, RelayEvent, RemovalReason};

/// The registry actor.
///
/// Entries are kept in a `BTreeMap` keyed by a registration sequence
/// number, so iteration order is registration order even though
/// handshakes complete in any order relative to accept.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Registered connections by registration sequence
    entries: BTreeMap<u64, RegistryEntry>,

    /// Sequence number of each registered connection
    index: HashMap<ConnectionId, u64>,

    /// Next registration sequence number
    next_seq: u64,

    /// Cleared by `Drain`; registrations are refused afterwards
    accepting: bool,

    /// Publisher for lifecycle events
    event_publisher: broadcast::Sender<RelayEvent>,
}

impl RegistryActor {
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<RelayEvent>,
    ) -> Self {
        Self {
            receiver,
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
            accepting: true,
            event_publisher,
        }
    }

    /// Runs the actor event loop until every handle is dropped.
    pub async fn run(mut self) {
        debug!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!(connections = self.connection_count(), "Registry actor stopped");
    }

    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                peer,
                name,
                respond_to,
            } => {
                let result = self.handle_register(peer, name);
                // Ignore send error - caller may have gone away
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove {
                id,
                reason,
                respond_to,
            } => {
                let result = self.handle_remove(id, reason);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.entries.values().cloned().collect());
            }
            RegistryCommand::Drain { respond_to } => {
                let result = self.handle_drain();
                let _ = respond_to.send(result);
            }
            RegistryCommand::Count { respond_to } => {
                let _ = respond_to.send(self.entries.len());
            }
        }
    }

    fn handle_register(&mut self, peer: Peer, name: String) -> Result<(), RegistryError> {
        if !self.accepting {
            debug!(connection = %peer.id(), name = %name, "Registration refused during shutdown");
            return Err(RegistryError::ShuttingDown);
        }

        let id = peer.id();
        if self.index.contains_key(&id) {
            error!(connection = %id, name = %name, "Connection registered twice");
            return Err(RegistryError::AlreadyRegistered(id));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(id, seq);
        self.entries.insert(
            seq,
            RegistryEntry {
                peer,
                name: name.clone(),
                joined_at: Utc::now(),
            },
        );

        info!(
            connection = %id,
            name = %name,
            total = self.entries.len(),
            "Registered"
        );

        // Publish event (ignore if no subscribers)
        let _ = self.event_publisher.send(RelayEvent::Registered { id, name });

        Ok(())
    }

    fn handle_remove(&mut self, id: ConnectionId, reason: RemovalReason) -> Option<RegistryEntry> {
        let seq = self.index.remove(&id)?;
        let entry = self.entries.remove(&seq)?;
        self.publish_removed(&entry, reason);
        Some(entry)
    }

    fn handle_drain(&mut self) -> Vec<RegistryEntry> {
        self.accepting = false;

        self.index.clear();
        let drained: Vec<RegistryEntry> = std::mem::take(&mut self.entries).into_values().collect();
        for entry in &drained {
            self.publish_removed(entry, RemovalReason::Shutdown);
        }
        drained
    }

    fn publish_removed(&self, entry: &RegistryEntry, reason: RemovalReason) {
        let connected_for = Utc::now() - entry.joined_at;

        info!(
            connection = %entry.id(),
            name = %entry.name,
            reason = %reason,
            seconds = connected_for.num_seconds(),
            remaining = self.entries.len(),
            "Disconnected"
        );

        let _ = self.event_publisher.send(RelayEvent::Removed {
            id: entry.id(),
            name: entry.name.clone(),
            reason,
            connected_for,
        });
    }

    /// Returns the number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::test_support::loopback_peer;
    use tokio::sync::oneshot;

    fn create_actor() -> (
        mpsc::Sender<RegistryCommand>,
        RegistryActor,
        broadcast::Receiver<RelayEvent>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = broadcast::channel(16);
        let actor = RegistryActor::new(cmd_rx, event_tx);
        (cmd_tx, actor, event_rx)
    }

    fn register(
        actor: &mut RegistryActor,
        peer: Peer,
        name: &str,
    ) -> oneshot::Receiver<Result<(), RegistryError>> {
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            peer,
            name: name.to_string(),
            respond_to: tx,
        });
        rx
    }

    #[tokio::test]
    async fn test_register_connection() {
        let (cmd_tx, mut actor, mut event_rx) = create_actor();
        let (peer, _client, _reader) = loopback_peer(1).await;

        let (tx, rx) = oneshot::channel();
        cmd_tx
            .send(RegistryCommand::Register {
                peer,
                name: "alice".to_string(),
                respond_to: tx,
            })
            .await
            .unwrap();

        // Process the command manually (actor not running in background)
        if let Some(cmd) = actor.receiver.recv().await {
            actor.handle_command(cmd);
        }

        assert!(rx.await.unwrap().is_ok());
        assert_eq!(actor.connection_count(), 1);

        let event = event_rx.try_recv().unwrap();
        assert!(matches!(event, RelayEvent::Registered { ref name, .. } if name == "alice"));
    }

    #[tokio::test]
    async fn test_register_duplicate_connection_fails() {
        let (_, mut actor, _) = create_actor();
        let (peer, _client, _reader) = loopback_peer(1).await;

        assert!(register(&mut actor, peer.clone(), "alice").await.unwrap().is_ok());
        let result = register(&mut actor, peer, "alice").await.unwrap();

        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(_))));
        assert_eq!(actor.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_names_allowed() {
        let (_, mut actor, _) = create_actor();
        let (p1, _c1, _r1) = loopback_peer(1).await;
        let (p2, _c2, _r2) = loopback_peer(2).await;

        assert!(register(&mut actor, p1, "sam").await.unwrap().is_ok());
        assert!(register(&mut actor, p2, "sam").await.unwrap().is_ok());
        assert_eq!(actor.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_, mut actor, mut event_rx) = create_actor();
        let (peer, _client, _reader) = loopback_peer(1).await;
        let id = peer.id();

        let _ = register(&mut actor, peer, "alice");
        let _ = event_rx.try_recv();

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Remove {
            id,
            reason: RemovalReason::SendFailed,
            respond_to: tx,
        });
        let first = rx.await.unwrap();
        assert_eq!(first.map(|e| e.name), Some("alice".to_string()));

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Remove {
            id,
            reason: RemovalReason::Disconnected,
            respond_to: tx,
        });
        assert!(rx.await.unwrap().is_none());

        // Exactly one removal event
        let event = event_rx.try_recv().unwrap();
        assert!(matches!(
            event,
            RelayEvent::Removed {
                reason: RemovalReason::SendFailed,
                ..
            }
        ));
        assert!(event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_snapshot_in_registration_order() {
        let (_, mut actor, _) = create_actor();
        let mut streams = Vec::new();
        for (raw, name) in [(3, "c"), (1, "a"), (2, "b")] {
            let (peer, client, reader) = loopback_peer(raw).await;
            streams.push((client, reader));
            let _ = register(&mut actor, peer, name);
        }

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Snapshot { respond_to: tx });
        let names: Vec<String> = rx.await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_reregistration_after_remove_goes_last() {
        let (_, mut actor, _) = create_actor();
        let mut streams = Vec::new();
        let mut peers = Vec::new();
        for raw in 1..=3 {
            let (peer, client, reader) = loopback_peer(raw).await;
            streams.push((client, reader));
            peers.push(peer);
        }

        for (peer, name) in peers.iter().zip(["a", "b", "c"]) {
            let _ = register(&mut actor, peer.clone(), name);
        }

        let (tx, _rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Remove {
            id: peers[0].id(),
            reason: RemovalReason::Disconnected,
            respond_to: tx,
        });
        let _ = register(&mut actor, peers[0].clone(), "a2");

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Snapshot { respond_to: tx });
        let names: Vec<String> = rx.await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b", "c", "a2"]);
        assert_eq!(actor.connection_count(), 3);
    }

    #[tokio::test]
    async fn test_drain_empties_and_refuses_registration() {
        let (_, mut actor, _) = create_actor();
        let (p1, _c1, _r1) = loopback_peer(1).await;
        let (p2, _c2, _r2) = loopback_peer(2).await;

        let _ = register(&mut actor, p1, "alice");

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Drain { respond_to: tx });
        assert_eq!(rx.await.unwrap().len(), 1);
        assert_eq!(actor.connection_count(), 0);

        let result = register(&mut actor, p2, "bob").await.unwrap();
        assert!(matches!(result, Err(RegistryError::ShuttingDown)));
        assert_eq!(actor.connection_count(), 0);
    }
}
