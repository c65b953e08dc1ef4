//! Solidity event declarations emitted by the watched contract.

// The sol! macro generates code that we can't document
#![allow(missing_docs)]

use alloy_sol_types::sol;

sol! {
    /// Emitted when the global visibility flag is toggled.
    #[derive(Debug, PartialEq, Eq)]
    event VisibilityChanged(bool visible);

    /// Emitted when a named entity changes state.
    #[derive(Debug, PartialEq, Eq)]
    event EntityStateChanged(string entity, bool state);
}
