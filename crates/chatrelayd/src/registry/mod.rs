//! Connection registry using Actor pattern.
//!
//! The registry is the authoritative record of who is currently attached to
//! the relay. A single actor task owns the entries and processes commands
//! sequentially, so every read and mutation is linearized through its
//! mpsc channel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ConnectionHandler │────▶│  RegistryActor  │────▶│ Broadcast Channel│
//! │  / Broadcaster   │     │                 │     │   (RelayEvent)   │
//! └──────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                       │
//!         │   RegistryCommand     │   RelayEvent          │
//!         │   (mpsc channel)      │   (broadcast)         │
//!         ▼                       ▼                       ▼
//!    Register/Remove        BTreeMap<ConnectionId,   Lifecycle hooks
//!    Snapshot/Drain         RegistryEntry>           (logging, tests)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryEntry, RegistryError, RelayEvent, RemovalReason};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Spawn the registry actor and return a handle for interaction.
///
/// # Example
///
/// ```no_run
/// use chatrelayd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///     let attached = handle.len().await;
///     assert_eq!(attached, 0);
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone());
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
