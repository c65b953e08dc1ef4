//! Last-known state of the named entities a deployment tracks.
//!
//! The set of entities is fixed at construction; only the values change.
//! Each value is an independent atomic, so a reader may observe a value from
//! just before or just after a concurrent update, never a torn map.

use crate::events::DecodeError;
use mona_sdk::objects::StateSnapshot;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Advisory cache of entity states, written by the poller and read by the
/// state-query endpoint.
#[derive(Debug)]
pub struct EntityStateCache {
    entries: BTreeMap<String, AtomicBool>,
}

impl EntityStateCache {
    /// Register `names`, all starting as `false`. Duplicates collapse.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = names
            .into_iter()
            .map(|name| (name.into(), AtomicBool::new(false)))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entries.contains_key(entity)
    }

    pub fn get(&self, entity: &str) -> Option<bool> {
        self.entries
            .get(entity)
            .map(|value| value.load(Ordering::Acquire))
    }

    /// Store `state` for `entity`. Unregistered names are rejected.
    pub fn set(&self, entity: &str, state: bool) -> Result<(), DecodeError> {
        let value = self
            .entries
            .get(entity)
            .ok_or_else(|| DecodeError::UnknownEntity(entity.to_string()))?;
        value.store(state, Ordering::Release);
        Ok(())
    }

    /// Copy of every entry.
    pub fn snapshot(&self) -> StateSnapshot {
        self.entries
            .iter()
            .map(|(name, value)| (name.clone(), value.load(Ordering::Acquire)))
            .collect()
    }
}
