//! On-chain event definitions and decoding.
//!
//! Raw logs returned by the external log are turned into [`RelayEvent`]s
//! here. The contract ABI is declared with `alloy-sol-types` so the
//! signature hashes and the data layout come straight from the Solidity
//! declarations.

pub mod contracts;
pub mod decoder;
pub mod types;

pub use decoder::{DecodeError, EventSchema};
pub use types::RelayEvent;
