//! Access to the external, append-only event log.
//!
//! The relay only needs two questions answered by the log: "what is the
//! newest block" and "which entries fall into this block range". Anything
//! that can answer those implements [`EventLog`]; the production
//! implementation is [`JsonRpcEventLog`], which speaks EVM JSON-RPC.

mod rpc;

pub use rpc::JsonRpcEventLog;

use crate::cursor::{BlockRange, LogPosition};
use alloy_primitives::{B256, Bytes};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while querying the external log.
///
/// Every variant is transient from the poller's point of view: it is logged
/// and the query is repeated on the next tick.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// HTTP transport error
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Rate limit exceeded
    #[error("rate limited by upstream")]
    RateLimited,

    /// The node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The response did not have the expected shape
    #[error("response parsing error: {0}")]
    Parse(String),
}

/// Undecoded log payload as delivered by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// One entry of the external log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub block_number: i64,
    pub log_index: i64,
    pub payload: RawLog,
}

impl LogEntry {
    pub fn position(&self) -> LogPosition {
        LogPosition::new(self.block_number, self.log_index)
    }
}

/// Range-queryable view of the external log.
///
/// Implementations are free to return entries in any order and to repeat
/// entries that were returned by an earlier call; the poller deduplicates.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Number of the newest block.
    async fn latest_block(&self) -> Result<i64, LedgerError>;

    /// Every entry in `range` (inclusive on both ends) matching this log's
    /// filter.
    async fn fetch_logs(&self, range: BlockRange) -> Result<Vec<LogEntry>, LedgerError>;
}

#[async_trait]
impl<T: EventLog + ?Sized> EventLog for Arc<T> {
    async fn latest_block(&self) -> Result<i64, LedgerError> {
        (**self).latest_block().await
    }

    async fn fetch_logs(&self, range: BlockRange) -> Result<Vec<LogEntry>, LedgerError> {
        (**self).fetch_logs(range).await
    }
}
