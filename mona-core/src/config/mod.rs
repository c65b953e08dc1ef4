//! Configuration types for the relay.
//!
//! These types represent the validated runtime configuration. Loading and
//! parsing the configuration file is handled by the server crate.

mod hub;
mod ledger;

pub use hub::HubConfig;
pub use ledger::LedgerConfig;

/// Everything the relay core needs, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// External log connection and polling behaviour.
    pub ledger: LedgerConfig,
    /// Subscriber delivery behaviour.
    pub hub: HubConfig,
    /// Registered entity names. Empty for single-flag deployments.
    pub entities: Vec<String>,
}

impl RelayConfig {
    /// `true` when the deployment tracks named entities.
    pub fn is_multi_entity(&self) -> bool {
        !self.entities.is_empty()
    }
}
