//! Shared wire types for the Mona relay.
//!
//! Everything a game client or an operator tool needs to talk to a running
//! relay lives here. The optional `client` feature adds a WebSocket
//! subscriber and a small HTTP client for the state-query endpoint.

pub mod objects;

#[cfg(feature = "client")]
pub mod client;
