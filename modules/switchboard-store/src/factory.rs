//! Store construction from configuration.

use std::fmt::Debug;

use tokio::runtime::Handle;
use typed_builder::TypedBuilder;

use crate::delegate::BoxDelegate;
use crate::engine::Store;
use crate::logger::Diagnostics;

/// Everything needed to build a [`Store`].
///
/// `initial_state`, `delegates` and `executor` are required. The executor is
/// the runtime every scoped task is spawned on; there is no ambient default.
#[derive(TypedBuilder)]
pub struct StoreConfig<S, E> {
    pub initial_state: S,
    pub delegates: Vec<BoxDelegate<S, E>>,
    pub executor: Handle,
    /// Replayed in order by `init`.
    #[builder(default)]
    pub init_events: Vec<E>,
    /// Call `init` before `create` returns.
    #[builder(default = true)]
    pub auto_init: bool,
    #[builder(default, setter(strip_option))]
    pub diagnostics: Option<Diagnostics>,
}

/// Build a store and, unless `auto_init` is off, initialize it.
pub fn create<S, E>(config: StoreConfig<S, E>) -> Store<S, E>
where
    S: Clone + Debug + Send + Sync + 'static,
    E: Debug + 'static,
{
    let StoreConfig {
        initial_state,
        delegates,
        executor,
        init_events,
        auto_init,
        diagnostics,
    } = config;

    let store = Store::new(initial_state, delegates, init_events, executor, diagnostics);
    if auto_init {
        store.init();
    }
    store
}
