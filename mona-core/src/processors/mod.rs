//! Long-running processors of the relay.
//!
//! - `LedgerPoller`: Polls the external log, emits `Notification`s
//! - `BroadcastHub`: Receives `Notification`s, fans them out to subscribers

pub mod hub;
pub mod poller;

pub use hub::{
    BroadcastHub, BroadcastReport, ChannelSubscriber, ConnectionId, DeliveryError, Subscriber,
};
pub use poller::{LedgerPoller, PollOutcome};
