//! castrel-client: client library for the castrel relay.
//!
//! Connects to a relay server, performs the display-name handshake, and
//! exposes typed send/receive halves over the framed stream.

mod client;

pub use client::{Relay, RelayReceiver, RelaySender};
