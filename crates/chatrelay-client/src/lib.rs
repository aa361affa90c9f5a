//! chatrelay client library
//!
//! Connects to a relay, answers the nickname handshake and then runs two
//! loops side by side: one printing whatever the relay sends, one sending
//! each input line as `<nick>: <text>`. When either loop ends the client
//! disconnects; there is no automatic reconnect.
//!
//! Chat lines can be end-to-end encrypted with [`SharedKeyCipher`]: every
//! client started with the same passphrase reads every other's messages,
//! while the relay only ever sees ciphertext.
//!
//! **Panic-Free Policy:** no `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()` or `todo!()` outside tests.

pub mod cipher;
pub mod client;
pub mod error;

pub use cipher::{SharedKeyCipher, KEY_ENV};
pub use client::{ChatClient, ClientConfig};
pub use error::{ClientError, Result};
