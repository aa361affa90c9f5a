//! Fixed protocol strings and message-unit classification.

/// Token sent by the relay immediately after accepting a connection.
pub const NICK_REQUEST: &[u8] = b"NICK";

/// Private acknowledgment sent to a client once its handshake succeeds.
pub const CONNECTED_ACK: &str = "Connected to the server.";

/// Size of the buffer used for a single transport read.
///
/// Whatever one read returns is relayed as one message unit, so this is
/// also the largest unit the relay forwards in one piece.
pub const READ_BUFFER_SIZE: usize = 4096;

/// Default bind / connect host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind / connect port
pub const DEFAULT_PORT: u16 = 55555;

/// Announcement broadcast to the other clients when `name` registers.
pub fn join_notice(name: &str) -> Vec<u8> {
    format!("{name} joined the chat.").into_bytes()
}

/// Announcement broadcast to the remaining clients when `name` leaves.
pub fn leave_notice(name: &str) -> Vec<u8> {
    format!("{name} left the chat.").into_bytes()
}

/// Bytes of the private "connected" acknowledgment.
pub fn connected_ack() -> Vec<u8> {
    CONNECTED_ACK.as_bytes().to_vec()
}

/// A message unit as seen from the client side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame<'a> {
    /// The relay is asking for a nickname.
    NickRequest,

    /// Anything else: a notice or a relayed payload.
    Payload(&'a [u8]),
}

impl<'a> ServerFrame<'a> {
    /// Classifies one message unit read from the relay.
    ///
    /// Only a unit that is exactly the handshake token counts as a request;
    /// a payload that merely starts with it is relayed data.
    pub fn classify(unit: &'a [u8]) -> Self {
        if unit == NICK_REQUEST {
            Self::NickRequest
        } else {
            Self::Payload(unit)
        }
    }
}
