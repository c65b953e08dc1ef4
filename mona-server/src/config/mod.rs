//! Configuration module for mona-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments,
//! and environment variables, and validating it into the runtime types
//! the relay core consumes.

pub mod file;

use crate::config::file::{FileConfig, StartSetting};
use alloy_primitives::Address;
use mona_core::config::{HubConfig, LedgerConfig, RelayConfig};
use mona_core::cursor::StartPolicy;
use mona_core::events::EventSchema;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
///
/// All of them are fatal: the server does not start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("no RPC endpoint configured (set ledger.rpc_url or MONA_RPC_URL)")]
    MissingRpcUrl,
}

/// Server-side settings that never reach the relay core.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub relay: RelayConfig,
}

/// Values from the command line or environment that win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen: Option<SocketAddr>,
    pub port: Option<u16>,
    pub rpc_url: Option<String>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    overrides: ConfigOverrides,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, overrides: ConfigOverrides) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            overrides,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI / environment overrides
    /// 3. Validate and convert into runtime types
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let file_config: FileConfig = toml::from_str(&config_content)?;
        self.build(file_config)
    }

    fn build(&self, mut file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
        // Apply overrides
        if let Some(listen) = self.overrides.listen {
            file_config.server.listen = listen;
        }
        if let Some(port) = self.overrides.port {
            file_config.server.listen.set_port(port);
        }
        if let Some(rpc_url) = &self.overrides.rpc_url {
            file_config.ledger.rpc_url = Some(rpc_url.clone());
        }

        let ledger = build_ledger(&file_config)?;
        let relay_section = file_config.relay;
        validate_entities(ledger.schema, &relay_section.entities)?;

        if relay_section.send_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "relay.send_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(LoadedConfig {
            server: ServerConfig {
                listen: file_config.server.listen,
            },
            relay: RelayConfig {
                ledger,
                hub: HubConfig {
                    send_timeout: Duration::from_millis(relay_section.send_timeout_ms),
                    subscriber_buffer: relay_section.subscriber_buffer.max(1),
                },
                entities: relay_section.entities,
            },
        })
    }
}

fn build_ledger(file_config: &FileConfig) -> Result<LedgerConfig, ConfigError> {
    let section = &file_config.ledger;

    let rpc_url = section.rpc_url.as_deref().ok_or(ConfigError::MissingRpcUrl)?;
    let rpc_url = Url::parse(rpc_url)
        .map_err(|e| ConfigError::ValidationError(format!("invalid rpc_url: {e}")))?;
    if !matches!(rpc_url.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "rpc_url must use http or https, got {}",
            rpc_url.scheme()
        )));
    }

    let contract_address: Address = section.contract_address.parse().map_err(|e| {
        ConfigError::ValidationError(format!(
            "invalid contract_address {}: {e}",
            section.contract_address
        ))
    })?;

    if section.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "ledger.poll_interval_secs must be greater than zero".to_string(),
        ));
    }

    let start = match (section.start_block, section.start) {
        (Some(block), _) if block < 0 => {
            return Err(ConfigError::ValidationError(format!(
                "ledger.start_block must not be negative, got {block}"
            )));
        }
        (Some(block), _) => StartPolicy::Block(block),
        (None, StartSetting::Head) => StartPolicy::Head,
        (None, StartSetting::Genesis) => StartPolicy::Genesis,
    };

    if section.max_block_range == Some(0) {
        return Err(ConfigError::ValidationError(
            "ledger.max_block_range must be greater than zero".to_string(),
        ));
    }

    Ok(LedgerConfig {
        rpc_url,
        contract_address,
        schema: section.event,
        poll_interval: Duration::from_secs(section.poll_interval_secs),
        request_timeout: Duration::from_secs(section.request_timeout_secs.max(1)),
        start,
        range_mode: section.range_mode,
        max_block_range: section.max_block_range,
    })
}

fn validate_entities(schema: EventSchema, entities: &[String]) -> Result<(), ConfigError> {
    match schema {
        EventSchema::Visibility if !entities.is_empty() => Err(ConfigError::ValidationError(
            "relay.entities requires ledger.event = \"entities\"".to_string(),
        )),
        EventSchema::Entities if entities.is_empty() => Err(ConfigError::ValidationError(
            "ledger.event = \"entities\" requires at least one entry in relay.entities"
                .to_string(),
        )),
        EventSchema::Entities => {
            for entity in entities {
                if entity.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "entity names must not be empty".to_string(),
                    ));
                }
                // Would be indistinguishable from a visibility frame.
                if entity == "visible" {
                    return Err(ConfigError::ValidationError(
                        "\"visible\" is reserved and cannot be used as an entity name"
                            .to_string(),
                    ));
                }
            }
            Ok(())
        }
        EventSchema::Visibility => Ok(()),
    }
}
