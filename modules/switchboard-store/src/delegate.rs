//! Delegate plumbing: boxed delegates, closure delegates, the state accessor
//! and the first-match dispatch walk.

use std::sync::Arc;

use crate::engine::StoreHandle;
use crate::scope::Scope;
use crate::state::StateContainer;
use crate::traits::Delegate;

/// Delegates as the store keeps them: owned, ordered, type-erased.
pub type BoxDelegate<S, E> = Box<dyn Delegate<S, E>>;

/// Reads the store's state at call time.
///
/// Hand this to async work instead of a captured snapshot; after an `.await`
/// the snapshot may be stale, the accessor never is.
pub struct StateAccessor<S> {
    container: Arc<StateContainer<S>>,
}

impl<S> StateAccessor<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(container: Arc<StateContainer<S>>) -> Self {
        Self { container }
    }

    pub fn get(&self) -> S {
        self.container.current()
    }
}

impl<S> Clone for StateAccessor<S> {
    fn clone(&self) -> Self {
        Self {
            container: Arc::clone(&self.container),
        }
    }
}

impl<S, E, F> Delegate<S, E> for F
where
    F: Fn(&E, &StoreHandle<S>, &Scope, &StateAccessor<S>) -> bool + Send + Sync,
{
    fn handle(
        &self,
        event: &E,
        store: &StoreHandle<S>,
        scope: &Scope,
        state: &StateAccessor<S>,
    ) -> bool {
        self(event, store, scope, state)
    }
}

/// Box a closure as a delegate.
pub fn delegate_fn<S, E, F>(f: F) -> BoxDelegate<S, E>
where
    F: Fn(&E, &StoreHandle<S>, &Scope, &StateAccessor<S>) -> bool + Send + Sync + 'static,
    S: 'static,
    E: 'static,
{
    Box::new(f)
}

/// Offer `event` to each delegate in order; stop at the first claim.
///
/// Returns the claiming delegate's position, or `None` if nobody claimed it.
pub(crate) fn dispatch<S, E>(
    delegates: &[BoxDelegate<S, E>],
    event: &E,
    store: &StoreHandle<S>,
    scope: &Scope,
    state: &StateAccessor<S>,
) -> Option<usize> {
    delegates
        .iter()
        .position(|delegate| delegate.handle(event, store, scope, state))
}
