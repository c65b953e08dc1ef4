use serde::{Deserialize, Serialize};

/// Body of `GET /`, used by external liveness probes.
pub const LIVENESS_TEXT: &str = "Mona relay is running!";

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Number of WebSocket subscribers currently registered with the hub.
    pub subscribers: usize,
}
