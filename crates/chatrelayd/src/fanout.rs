//! Best-effort broadcast to registered connections.
//!
//! A broadcast takes a snapshot of the registry and writes the payload to
//! every entry except the excluded one. A failed write removes that peer,
//! closes its transport and queues a leave notice for the survivors; it
//! never stops delivery to the rest and never reaches the caller.
//!
//! The registry lock (the actor) is only held for the snapshot copy. Each
//! peer's writer has its own mutex, so a unit is written to one peer
//! atomically while different broadcasts may proceed in parallel across
//! different peers.

use std::collections::VecDeque;

use tracing::{debug, trace};

use chatrelay_protocol::leave_notice;

use crate::peer::ConnectionId;
use crate::registry::{RegistryHandle, RemovalReason};

/// Fans a payload out to every registered connection.
#[derive(Clone)]
pub struct Broadcaster {
    registry: RegistryHandle,
}

impl Broadcaster {
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }

    /// Delivers `payload` verbatim to every registered connection except
    /// `exclude`.
    ///
    /// Leave notices for peers dropped along the way are delivered before
    /// this returns.
    pub async fn broadcast(&self, payload: Vec<u8>, exclude: Option<ConnectionId>) {
        let mut pending = VecDeque::from([(payload, exclude)]);

        while let Some((payload, exclude)) = pending.pop_front() {
            let recipients = self.registry.snapshot().await;
            let mut delivered = 0usize;

            for entry in recipients.iter().filter(|e| Some(e.id()) != exclude) {
                match entry.peer.send(&payload).await {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        debug!(
                            connection = %entry.id(),
                            name = %entry.name,
                            error = %e,
                            "Delivery failed, dropping recipient"
                        );

                        // Lost the race to the handler's own teardown: it
                        // announces the departure instead.
                        if let Some(removed) = self
                            .registry
                            .remove(entry.id(), RemovalReason::SendFailed)
                            .await
                        {
                            removed.peer.close().await;
                            pending.push_back((leave_notice(&removed.name), None));
                        }
                    }
                }
            }

            trace!(bytes = payload.len(), recipients = delivered, "Broadcast");
        }
    }
}
