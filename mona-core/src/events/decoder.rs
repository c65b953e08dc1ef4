use super::contracts::{EntityStateChanged, VisibilityChanged};
use super::types::RelayEvent;
use crate::ledger::RawLog;
use alloy_primitives::B256;
use alloy_sol_types::SolEvent;
use serde::Deserialize;
use thiserror::Error;

/// Errors that make a single log entry undeliverable.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// topic0 is missing or belongs to a different event
    #[error("unexpected event signature: {found:?}")]
    SignatureMismatch { found: Option<B256> },

    /// topics or data do not match the ABI
    #[error("ABI decode error: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    /// the entity is not part of the registered set
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
}

/// Which contract event a deployment listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSchema {
    /// `VisibilityChanged(bool)`; one global flag.
    #[default]
    Visibility,
    /// `EntityStateChanged(string,bool)`; named entities.
    Entities,
}

impl EventSchema {
    /// topic0 value used to filter the log query.
    pub fn signature_hash(&self) -> B256 {
        match self {
            EventSchema::Visibility => VisibilityChanged::SIGNATURE_HASH,
            EventSchema::Entities => EntityStateChanged::SIGNATURE_HASH,
        }
    }

    pub fn signature(&self) -> &'static str {
        match self {
            EventSchema::Visibility => VisibilityChanged::SIGNATURE,
            EventSchema::Entities => EntityStateChanged::SIGNATURE,
        }
    }

    /// Decode a raw log into a [`RelayEvent`].
    pub fn decode(&self, log: &RawLog) -> Result<RelayEvent, DecodeError> {
        let expected = self.signature_hash();
        let found = log.topics.first().copied();
        if found != Some(expected) {
            return Err(DecodeError::SignatureMismatch { found });
        }

        match self {
            EventSchema::Visibility => {
                let event = decode_event::<VisibilityChanged>(log)?;
                Ok(RelayEvent::VisibilityChanged {
                    visible: event.visible,
                })
            }
            EventSchema::Entities => {
                let event = decode_event::<EntityStateChanged>(log)?;
                Ok(RelayEvent::EntityStateChanged {
                    entity: event.entity,
                    state: event.state,
                })
            }
        }
    }
}

fn decode_event<E: SolEvent>(log: &RawLog) -> Result<E, DecodeError> {
    let event = E::decode_raw_log(log.topics.iter().copied(), &log.data, true)?;
    Ok(event)
}
