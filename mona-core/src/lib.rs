#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod cursor;
pub mod events;
pub mod ledger;
pub mod processors;
pub mod relay;
pub mod state;

pub use relay::Relay;
