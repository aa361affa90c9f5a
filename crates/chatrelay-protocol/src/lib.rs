//! chatrelay protocol - wire constants shared by the relay and its clients
//!
//! The relay has no framing of its own: one transport read is one message
//! unit, and user payloads travel as opaque bytes. The only text the relay
//! ever produces is the handshake token and the three fixed notices defined
//! in [`message`].

pub mod handshake;
pub mod message;
pub mod transform;

pub use handshake::{parse_nickname, HandshakeError};
pub use message::{
    connected_ack, join_notice, leave_notice, ServerFrame, CONNECTED_ACK, DEFAULT_HOST,
    DEFAULT_PORT, NICK_REQUEST, READ_BUFFER_SIZE,
};
pub use transform::{PayloadTransform, Plaintext, TransformError};
