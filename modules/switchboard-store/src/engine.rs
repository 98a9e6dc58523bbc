//! The store: state, ordered delegates, lifecycle.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::delegate::{self, BoxDelegate, StateAccessor};
use crate::error::StoreError;
use crate::logger::Diagnostics;
use crate::scope::Scope;
use crate::state::{StateContainer, StateStream};

const UNNAMED: &str = "store";

/// Where a store is in its life. `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Constructed,
    Initialized,
    Disposed,
}

// ---------------------------------------------------------------------------
// StoreHandle — what delegates and observers get
// ---------------------------------------------------------------------------

/// Read and write access to a store's state, without access to dispatch.
///
/// Cheap to clone; move clones into scoped tasks. Writes are serialized: an
/// `update_state` always transforms the value left by the write before it.
pub struct StoreHandle<S> {
    inner: Arc<HandleInner<S>>,
}

struct HandleInner<S> {
    container: Arc<StateContainer<S>>,
    diagnostics: Option<Diagnostics>,
    writes: Mutex<()>,
}

impl<S> StoreHandle<S>
where
    S: Clone + Debug + Send + Sync + 'static,
{
    fn new(container: Arc<StateContainer<S>>, diagnostics: Option<Diagnostics>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                container,
                diagnostics,
                writes: Mutex::new(()),
            }),
        }
    }

    pub fn current(&self) -> S {
        self.inner.container.current()
    }

    pub fn observe(&self) -> StateStream<S> {
        self.inner.container.observe()
    }

    /// Replace the state with `next`. Ignored after dispose.
    pub fn set_state(&self, next: S) {
        let _writes = self.lock_writes();
        self.install(next, "set_state");
    }

    /// Replace the state with `transform(current)`. Ignored after dispose.
    ///
    /// `transform` may read the state but must not write it.
    pub fn update_state<F>(&self, transform: F)
    where
        F: FnOnce(&S) -> S,
    {
        let _writes = self.lock_writes();
        if self.is_disposed() {
            self.ignored("update_state");
            return;
        }
        let current = self.inner.container.current();
        self.install(transform(&current), "update_state");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.container.is_closed()
    }

    fn install(&self, next: S, op: &str) {
        let line = self
            .inner
            .diagnostics
            .as_ref()
            .map(|_| format!("state {next:?}"));

        if !self.inner.container.replace(next) {
            self.ignored(op);
            return;
        }
        debug!(op, "state replaced");
        if let (Some(diagnostics), Some(line)) = (&self.inner.diagnostics, line) {
            diagnostics.log(line);
        }
    }

    fn ignored(&self, op: &str) {
        debug!(op, "ignored after dispose");
        if let Some(diagnostics) = &self.inner.diagnostics {
            diagnostics.log(format_args!("ignored {op} after dispose"));
        }
    }

    fn close(&self) {
        let _writes = self.lock_writes();
        self.inner.container.close();
    }

    fn accessor(&self) -> StateAccessor<S> {
        StateAccessor::new(Arc::clone(&self.inner.container))
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.inner
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Event-routed state store.
///
/// `accept` offers an event to each delegate in configured order; the first
/// one that claims it handles it and the rest never see it. Delegates write
/// state through a [`StoreHandle`] and park async work on the store's
/// [`Scope`]. Dropping the store disposes it.
pub struct Store<S, E>
where
    S: Clone + Debug + Send + Sync + 'static,
    E: Debug + 'static,
{
    handle: StoreHandle<S>,
    accessor: StateAccessor<S>,
    delegates: Vec<BoxDelegate<S, E>>,
    init_events: Vec<E>,
    scope: Scope,
    diagnostics: Option<Diagnostics>,
    lifecycle: Mutex<Lifecycle>,
    dispatching: Mutex<()>,
}

impl<S, E> Store<S, E>
where
    S: Clone + Debug + Send + Sync + 'static,
    E: Debug + 'static,
{
    /// Build a store in the `Constructed` state. Nothing is dispatched yet.
    ///
    /// Scoped work is spawned on `executor`.
    pub fn new(
        initial_state: S,
        delegates: Vec<BoxDelegate<S, E>>,
        init_events: Vec<E>,
        executor: Handle,
        diagnostics: Option<Diagnostics>,
    ) -> Self {
        let name = diagnostics
            .as_ref()
            .map_or(UNNAMED, Diagnostics::name)
            .to_string();

        if delegates.is_empty() {
            warn!(store = %name, "store built without delegates");
            if let Some(diagnostics) = &diagnostics {
                diagnostics.throw_if_debug(StoreError::NoDelegates { name: name.clone() });
            }
        }

        let container = Arc::new(StateContainer::new(initial_state));
        let handle = StoreHandle::new(container, diagnostics.clone());

        Self {
            accessor: handle.accessor(),
            handle,
            delegates,
            init_events,
            scope: Scope::new(name, executor),
            diagnostics,
            lifecycle: Mutex::new(Lifecycle::Constructed),
            dispatching: Mutex::new(()),
        }
    }

    /// Replay the configured initial events, in order.
    ///
    /// Runs once. Later calls replay nothing and report
    /// [`StoreError::AlreadyInitialized`]; calls after dispose are ignored.
    pub fn init(&self) {
        let previous = {
            let mut lifecycle = self.lock_lifecycle();
            let previous = *lifecycle;
            if previous == Lifecycle::Constructed {
                *lifecycle = Lifecycle::Initialized;
            }
            previous
        };

        match previous {
            Lifecycle::Constructed => {}
            Lifecycle::Initialized => {
                warn!(store = %self.name(), "init called twice");
                if let Some(diagnostics) = &self.diagnostics {
                    diagnostics.throw_if_debug(StoreError::AlreadyInitialized {
                        name: self.name().to_string(),
                    });
                }
                return;
            }
            Lifecycle::Disposed => {
                self.handle.ignored("init");
                return;
            }
        }

        debug!(store = %self.name(), events = self.init_events.len(), "initializing");
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.log("initializing");
        }
        for event in &self.init_events {
            self.dispatch(event);
        }
    }

    /// Submit one event. Fire-and-forget: the caller never learns which
    /// delegate took it. Ignored after dispose.
    pub fn accept(&self, event: E) {
        self.dispatch(&event);
    }

    /// Cancel all scoped work, end every observer stream and freeze the state.
    /// Later calls do nothing.
    pub fn dispose(&self) {
        {
            let mut lifecycle = self.lock_lifecycle();
            if *lifecycle == Lifecycle::Disposed {
                return;
            }
            *lifecycle = Lifecycle::Disposed;
        }

        // Close before cancelling so no in-flight task can land a write.
        self.handle.close();
        self.scope.cancel();

        debug!(store = %self.name(), "disposed");
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.log("disposed");
        }
    }

    pub fn state(&self) -> S {
        self.handle.current()
    }

    pub fn observe(&self) -> StateStream<S> {
        self.handle.observe()
    }

    /// A handle for code outside the store that needs to read or observe state.
    pub fn handle(&self) -> StoreHandle<S> {
        self.handle.clone()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lock_lifecycle()
    }

    pub fn name(&self) -> &str {
        self.diagnostics
            .as_ref()
            .map_or(UNNAMED, Diagnostics::name)
    }

    fn dispatch(&self, event: &E) {
        let _dispatching = self
            .dispatching
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.handle.is_disposed() {
            self.handle.ignored("accept");
            return;
        }

        debug!(store = %self.name(), event = ?event, "accept");
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.log(format_args!("accept {event:?}"));
        }

        match delegate::dispatch(
            &self.delegates,
            event,
            &self.handle,
            &self.scope,
            &self.accessor,
        ) {
            Some(position) => debug!(store = %self.name(), delegate = position, "event claimed"),
            None => {
                warn!(store = %self.name(), event = ?event, "event not handled");
                if let Some(diagnostics) = &self.diagnostics {
                    diagnostics.throw_if_debug(StoreError::Unhandled {
                        name: self.name().to_string(),
                        event: format!("{event:?}"),
                    });
                }
            }
        }
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S, E> Drop for Store<S, E>
where
    S: Clone + Debug + Send + Sync + 'static,
    E: Debug + 'static,
{
    fn drop(&mut self) {
        self.dispose();
    }
}
