//! chatrelay daemon - connection registry and broadcast relay
//!
//! This crate provides the server side of chatrelay:
//! - `registry` - Connection registry actor tracking who is attached
//! - `fanout` - Best-effort broadcast of one payload to registered peers
//! - `server` - TCP accept loop, per-connection handlers and shutdown
//! - `config` - Bind address and read buffer configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      chatrelayd                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   RelayServer   │────▶│       RegistryActor         │   │
//! │  │  (TcpListener)  │     │  (connection -> name owner) │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ one task per connection     │ snapshot          │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│────▶│        Broadcaster          │   │
//! │  │  (per client)   │     │  (fan-out, drops dead peers) │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate does not use `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()` or `todo!()`. Per-connection failures stay
//! inside the connection's own task.

pub mod config;
pub mod fanout;
pub mod peer;
pub mod registry;
pub mod server;
