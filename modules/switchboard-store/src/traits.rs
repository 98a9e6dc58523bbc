//! Core traits for the store.

use crate::delegate::StateAccessor;
use crate::engine::StoreHandle;
use crate::error::StoreError;
use crate::scope::Scope;

/// Diagnostic sink. Receives plain text lines and fatal-in-debug assertions.
///
/// Implemented by `TracingLogger` (production) and `RecordingLogger` (tests).
/// Also implemented for `Arc<L>` so a recorder can be shared for assertions.
pub trait Logger: Send + Sync {
    /// Record one diagnostic line.
    fn log(&self, message: &str);

    /// Report a condition that should crash a development build and be
    /// tolerated in production.
    fn throw_if_debug(&self, error: StoreError);
}

/// Claims and handles the events it recognises.
///
/// Called synchronously from the dispatch loop. Returning `true` claims the
/// event and stops dispatch; later delegates never see it. Asynchronous work
/// goes on `scope` so it dies with the store. `state` reads the value current
/// at call time, not the one current at dispatch time.
pub trait Delegate<S, E>: Send + Sync {
    fn handle(
        &self,
        event: &E,
        store: &StoreHandle<S>,
        scope: &Scope,
        state: &StateAccessor<S>,
    ) -> bool;
}
