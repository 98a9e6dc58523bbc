//! Typed diagnostics raised by the store.

use thiserror::Error;

/// Conditions the store reports through [`Logger::throw_if_debug`].
///
/// None of these unwind out of `accept` or `init` on their own; the logger
/// decides whether a debug build should fail loudly.
///
/// [`Logger::throw_if_debug`]: crate::Logger::throw_if_debug
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store was built with an empty delegate list
    #[error("{name}: no event delegates")]
    NoDelegates { name: String },

    /// No delegate claimed the event
    #[error("{name}: event not handled: {event}")]
    Unhandled { name: String, event: String },

    /// `init` called on a store that already replayed its initial events
    #[error("{name}: already initialized")]
    AlreadyInitialized { name: String },
}
