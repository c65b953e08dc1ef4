//! Wiring of one relay instance.
//!
//! A [`Relay`] owns the hub and the entity cache. The server hands clones of
//! the shared handles to its request handlers and spawns the poller once;
//! nothing is process-global, so independent relays can coexist in a test.

use crate::config::{HubConfig, RelayConfig};
use crate::cursor::CursorTracker;
use crate::ledger::{EventLog, JsonRpcEventLog, LedgerError};
use crate::processors::{BroadcastHub, LedgerPoller};
use crate::state::EntityStateCache;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shared handles of a running relay.
#[derive(Clone)]
pub struct Relay {
    config: Arc<RelayConfig>,
    hub: Arc<BroadcastHub>,
    cache: Option<Arc<EntityStateCache>>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        let hub = Arc::new(BroadcastHub::new(config.hub.send_timeout));
        let cache = config
            .is_multi_entity()
            .then(|| Arc::new(EntityStateCache::new(config.entities.iter().cloned())));
        Self {
            config: Arc::new(config),
            hub,
            cache,
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Entity cache, present only in multi-entity deployments.
    pub fn cache(&self) -> Option<&Arc<EntityStateCache>> {
        self.cache.as_ref()
    }

    pub fn hub_config(&self) -> HubConfig {
        self.config.hub
    }

    /// Build a poller over `log` that feeds this relay's hub and cache.
    pub fn poller<L: EventLog>(&self, log: L) -> LedgerPoller<L> {
        let ledger = &self.config.ledger;
        let mut tracker = CursorTracker::new(ledger.start, ledger.range_mode);
        if let Some(blocks) = ledger.max_block_range {
            tracker = tracker.with_max_block_range(blocks);
        }
        let poller = LedgerPoller::new(
            log,
            tracker,
            ledger.schema,
            Arc::clone(&self.hub),
            ledger.poll_interval,
        );
        match &self.cache {
            Some(cache) => poller.with_cache(Arc::clone(cache)),
            None => poller,
        }
    }

    /// Spawn the poll loop against the configured JSON-RPC endpoint.
    pub fn spawn_poller(
        &self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, LedgerError> {
        let ledger = &self.config.ledger;
        let log = JsonRpcEventLog::new(
            ledger.rpc_url.clone(),
            ledger.contract_address,
            ledger.schema.signature_hash(),
            ledger.request_timeout,
        )?;
        Ok(tokio::spawn(self.poller(log).run(shutdown_rx)))
    }
}
