//! TOML file configuration structures.
//!
//! These structs directly map to the `mona-config.toml` file format.

use mona_core::cursor::RangeMode;
use mona_core::events::EventSchema;
use serde::Deserialize;
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:5000").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

/// Where to start reading the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartSetting {
    #[default]
    Head,
    Genesis,
}

/// External log section.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint. May be left out and supplied via `MONA_RPC_URL`.
    pub rpc_url: Option<String>,
    /// Address of the contract emitting the events.
    pub contract_address: String,
    /// `visibility` or `entities`.
    #[serde(default)]
    pub event: EventSchema,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub start: StartSetting,
    /// Explicit first block; takes precedence over `start`.
    pub start_block: Option<i64>,
    #[serde(default)]
    pub range_mode: RangeMode,
    /// Cap on the blocks one `eth_getLogs` call may span.
    pub max_block_range: Option<u64>,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Subscriber-facing section.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// Entity names for multi-entity deployments.
    #[serde(default)]
    pub entities: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
            subscriber_buffer: default_subscriber_buffer(),
            entities: Vec::new(),
        }
    }
}

fn default_send_timeout_ms() -> u64 {
    2000
}

fn default_subscriber_buffer() -> usize {
    32
}
