use crate::cursor::{RangeMode, StartPolicy};
use crate::events::EventSchema;
use alloy_primitives::Address;
use std::time::Duration;
use url::Url;

/// External log settings.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the EVM node.
    pub rpc_url: Url,
    /// Contract whose events are relayed.
    pub contract_address: Address,
    /// Event the contract emits.
    pub schema: EventSchema,
    /// Time between two poll cycles.
    pub poll_interval: Duration,
    /// Upper bound for one JSON-RPC round trip.
    pub request_timeout: Duration,
    pub start: StartPolicy,
    pub range_mode: RangeMode,
    /// Upper bound on the blocks covered by one log query.
    pub max_block_range: Option<u64>,
}
