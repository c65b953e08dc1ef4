use super::{EventLog, LedgerError, LogEntry, RawLog};
use crate::cursor::BlockRange;
use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// [`EventLog`] backed by an EVM JSON-RPC endpoint.
///
/// Uses `eth_blockNumber` for the head and `eth_getLogs` filtered by the
/// contract address and a single topic0.
pub struct JsonRpcEventLog {
    rpc_url: Url,
    address: Address,
    topic0: B256,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcEventLog {
    /// Create a new JsonRpcEventLog.
    ///
    /// # Arguments
    ///
    /// * `rpc_url` - JSON-RPC endpoint of an EVM node or provider
    /// * `address` - The contract whose logs are watched
    /// * `topic0` - Event signature hash to filter on
    /// * `request_timeout` - Upper bound for a single HTTP round trip
    ///
    /// Fails if the HTTP client cannot be built; there is no fallback
    /// client without the timeout.
    pub fn new(
        rpc_url: Url,
        address: Address,
        topic0: B256,
        request_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            rpc_url,
            address,
            topic0,
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: P,
    ) -> Result<T, LedgerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http_client
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LedgerError::RateLimited);
        }

        let response: RpcResponse<T> = response.error_for_status()?.json().await?;
        if let Some(error) = response.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| LedgerError::Parse(format!("{method}: missing result")))
    }
}

#[async_trait]
impl EventLog for JsonRpcEventLog {
    async fn latest_block(&self) -> Result<i64, LedgerError> {
        let head: String = self.call("eth_blockNumber", serde_json::json!([])).await?;
        parse_quantity(&head)
    }

    async fn fetch_logs(&self, range: BlockRange) -> Result<Vec<LogEntry>, LedgerError> {
        let filter = LogFilter {
            address: self.address,
            topics: [self.topic0],
            from_block: format!("{:#x}", range.from_block),
            to_block: format!("{:#x}", range.to_block),
        };

        debug!(
            address = %self.address,
            from_block = range.from_block,
            to_block = range.to_block,
            "Fetching logs"
        );

        let logs: Vec<RpcLog> = self.call("eth_getLogs", [filter]).await?;

        let mut entries = Vec::with_capacity(logs.len());
        for log in logs {
            if log.removed {
                debug!(tx = ?log.transaction_hash, "Skipping removed log");
                continue;
            }
            // Pending logs carry no position yet.
            let (Some(block_number), Some(log_index)) = (log.block_number, log.log_index) else {
                continue;
            };
            entries.push(LogEntry {
                block_number: parse_quantity(&block_number)?,
                log_index: parse_quantity(&log_index)?,
                payload: RawLog {
                    topics: log.topics,
                    data: log.data,
                },
            });
        }
        Ok(entries)
    }
}

/// Parse a JSON-RPC hex quantity such as `"0x1b4"`.
fn parse_quantity(value: &str) -> Result<i64, LedgerError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::Parse(format!("quantity without 0x prefix: {value}")))?;
    i64::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Parse(format!("invalid quantity {value}: {e}")))
}

#[derive(Debug, Serialize)]
struct RpcRequest<P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogFilter {
    address: Address,
    topics: [B256; 1],
    from_block: String,
    to_block: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    block_number: Option<String>,
    log_index: Option<String>,
    transaction_hash: Option<B256>,
    topics: Vec<B256>,
    data: Bytes,
    #[serde(default)]
    removed: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_timeout_bounds_each_call() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let log = JsonRpcEventLog::new(
            format!("http://{addr}").parse().unwrap(),
            Address::ZERO,
            B256::ZERO,
            Duration::from_millis(200),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(10), log.latest_block())
            .await
            .unwrap();
        assert!(matches!(result, Err(LedgerError::Request(ref e)) if e.is_timeout()));
        assert!(started.elapsed() < Duration::from_secs(5));
        silent.abort();
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert!(parse_quantity("1b4").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_log_filter_shape() {
        let filter = LogFilter {
            address: Address::ZERO,
            topics: [B256::ZERO],
            from_block: format!("{:#x}", 101),
            to_block: format!("{:#x}", 102),
        };
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["fromBlock"], "0x65");
        assert_eq!(json["toBlock"], "0x66");
        assert_eq!(
            json["address"],
            "0x0000000000000000000000000000000000000000"
        );
        assert_eq!(json["topics"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_rpc_log_parsing() {
        let body = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "result": [{
                "address": "0x4f3ac69d127a8b0ad3b9dfabdc3a19dc3b34c240",
                "blockNumber": "0x65",
                "logIndex": "0x1",
                "transactionHash": "0x0000000000000000000000000000000000000000000000000000000000000001",
                "topics": ["0x0000000000000000000000000000000000000000000000000000000000000002"],
                "data": "0x0000000000000000000000000000000000000000000000000000000000000001",
                "removed": false
            }]
        }"#;
        let response: RpcResponse<Vec<RpcLog>> = serde_json::from_str(body).unwrap();
        let logs = response.result.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number.as_deref(), Some("0x65"));
        assert_eq!(logs[0].data.len(), 32);
        assert!(!logs[0].removed);
    }

    #[test]
    fn test_rpc_error_parsing() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"query returned more than 10000 results"}}"#;
        let response: RpcResponse<Vec<RpcLog>> = serde_json::from_str(body).unwrap();
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32005);
    }
}
