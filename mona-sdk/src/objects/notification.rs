//! Messages pushed to subscribers over the `/ws` stream.
//!
//! # Protocol
//!
//! The relay only ever sends. Every frame is a UTF-8 JSON text frame whose
//! shape is fixed for the lifetime of a deployment:
//!
//! ```json
//! {"visible":true}
//! ```
//!
//! for single-flag deployments, or the full entity snapshot
//!
//! ```json
//! {"bridge":false,"door":true}
//! ```
//!
//! for multi-entity deployments. Frames sent by the client are ignored;
//! closing the socket unsubscribes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last-known state of every registered entity, keyed by entity name.
///
/// This is also the body of `GET /state`.
pub type StateSnapshot = BTreeMap<String, bool>;

/// A single relay-to-subscriber message.
///
/// Serialized untagged so the JSON shape matches the field set exactly.
/// A multi-entity deployment must not register an entity literally named
/// `visible`, otherwise the two shapes become indistinguishable on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Notification {
    /// The global visibility flag changed.
    Visibility {
        visible: bool,
    },
    /// One entity changed; carries the snapshot after applying the change.
    Entities(StateSnapshot),
}

impl Notification {
    /// Serialize to the exact text that goes into a WebSocket frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
