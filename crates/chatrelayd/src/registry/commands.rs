//! Registry actor commands, errors, and events.
//!
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RelayEvent`: Lifecycle notifications published to subscribers

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::peer::{ConnectionId, Peer};

// ============================================================================
// Registry Entries
// ============================================================================

/// A registered connection paired with its display name.
///
/// Display names are not unique; two entries may carry the same name.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Handle used to send to and close the connection
    pub peer: Peer,
    /// Nickname supplied during the handshake
    pub name: String,
    /// When the entry was inserted
    pub joined_at: DateTime<Utc>,
}

impl RegistryEntry {
    pub fn id(&self) -> ConnectionId {
        self.peer.id()
    }
}

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command carries a oneshot channel for the response.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Register a connection after a successful handshake.
    ///
    /// # Errors
    /// - `RegistryError::AlreadyRegistered` if the connection is present
    /// - `RegistryError::ShuttingDown` once the registry has been drained
    Register {
        peer: Peer,
        name: String,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove a connection. Replies `None` if it was already gone.
    Remove {
        id: ConnectionId,
        reason: RemovalReason,
        respond_to: oneshot::Sender<Option<RegistryEntry>>,
    },

    /// Point-in-time copy of all entries, in registration order.
    Snapshot {
        respond_to: oneshot::Sender<Vec<RegistryEntry>>,
    },

    /// Remove every entry and refuse further registrations.
    Drain {
        respond_to: oneshot::Sender<Vec<RegistryEntry>>,
    },

    /// Number of registered connections.
    Count { respond_to: oneshot::Sender<usize> },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The connection is already registered.
    ///
    /// Registration happens at exactly one point per connection, so this
    /// indicates a bug rather than a client mistake.
    #[error("connection already registered: {0}")]
    AlreadyRegistered(ConnectionId),

    /// The registry was drained for shutdown.
    #[error("registry is shutting down")]
    ShuttingDown,

    /// The response channel was closed before receiving a response.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Relay Events
// ============================================================================

/// Why a connection left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The handler's read loop ended (EOF or transport error).
    Disconnected,

    /// A broadcast could not be delivered to this connection.
    SendFailed,

    /// The server is shutting down.
    Shutdown,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "client disconnected"),
            Self::SendFailed => write!(f, "delivery failed"),
            Self::Shutdown => write!(f, "server shutdown"),
        }
    }
}

/// Lifecycle notifications for logging and observation.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A transport connection was accepted.
    Connected { id: ConnectionId, addr: SocketAddr },

    /// The nickname handshake failed; the connection was closed unregistered.
    HandshakeRejected {
        id: ConnectionId,
        addr: SocketAddr,
        reason: String,
    },

    /// A connection completed its handshake and was registered.
    Registered { id: ConnectionId, name: String },

    /// A connection was removed from the registry.
    Removed {
        id: ConnectionId,
        name: String,
        reason: RemovalReason,
        connected_for: TimeDelta,
    },

    /// Shutdown began with this many registered connections.
    ShutdownStarted { connections: usize },

    /// The listening socket is closed.
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::AlreadyRegistered(ConnectionId::new(3));
        assert_eq!(err.to_string(), "connection already registered: conn-3");

        let err = RegistryError::ShuttingDown;
        assert_eq!(err.to_string(), "registry is shutting down");

        let err = RegistryError::ChannelClosed;
        assert_eq!(err.to_string(), "response channel closed");
    }

    #[test]
    fn test_removal_reason_display() {
        assert_eq!(RemovalReason::Disconnected.to_string(), "client disconnected");
        assert_eq!(RemovalReason::SendFailed.to_string(), "delivery failed");
        assert_eq!(RemovalReason::Shutdown.to_string(), "server shutdown");
    }
}
