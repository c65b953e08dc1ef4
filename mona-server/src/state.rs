//! Application state shared across all request handlers.

use mona_core::Relay;

/// Shared application state.
///
/// Cheap to clone; every handle inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
}

impl AppState {
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }
}
