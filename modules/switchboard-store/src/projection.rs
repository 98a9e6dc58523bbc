//! Derived, mapped view of a store's state for presentation layers.
//!
//! A projection shares one upstream subscription between all of its
//! observers. The upstream starts with the first observer and keeps running
//! for `stop_after` once the last observer leaves; if nobody comes back in
//! that window it stops. The next observer restarts it from the store's
//! then-current state. Disposing the store ends the projection for good.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::StoreHandle;
use crate::state::{StateContainer, StateStream};

type Upstream<M> = Box<dyn Fn() -> BoxStream<'static, M> + Send + Sync>;

/// Mapped, shared, idle-stopping view of a store.
pub struct Projection<M> {
    inner: Arc<ProjectionInner<M>>,
}

struct ProjectionInner<M> {
    upstream: Upstream<M>,
    output: Arc<StateContainer<M>>,
    subscriptions: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
    stop_after: Duration,
    executor: Handle,
}

impl<M> Projection<M>
where
    M: Clone + Send + Sync + 'static,
{
    /// Project `store` through `map`. The upstream task runs on `executor`.
    pub fn new<S, F>(store: &StoreHandle<S>, map: F, stop_after: Duration, executor: Handle) -> Self
    where
        S: Clone + Debug + Send + Sync + 'static,
        F: Fn(&S) -> M + Send + Sync + 'static,
    {
        let seed = map(&store.current());
        let map = Arc::new(map);

        let store = store.clone();
        let upstream: Upstream<M> = Box::new(move || {
            let map = Arc::clone(&map);
            store.observe().map(move |state| (*map)(&state)).boxed()
        });

        Self {
            inner: Arc::new(ProjectionInner {
                upstream,
                output: Arc::new(StateContainer::new(seed)),
                subscriptions: Arc::new(AtomicU64::new(0)),
                task: Mutex::new(None),
                stop_after,
                executor,
            }),
        }
    }

    /// Latest mapped model.
    pub fn current(&self) -> M {
        self.inner.output.current()
    }

    /// Subscribe, starting the upstream if it is idle.
    ///
    /// The new observer is attached before the upstream task is spawned, so
    /// the task never sees an empty audience on its first poll.
    pub fn observe(&self) -> StateStream<M> {
        let mut task = self.lock_task();
        let source = self.restart_source(&task);

        let stream = self.inner.output.observe();
        self.inner.subscriptions.fetch_add(1, Ordering::SeqCst);

        if let Some(source) = source {
            debug!("projection upstream started");
            *task = Some(self.inner.executor.spawn(run_upstream(
                Arc::clone(&self.inner.output),
                source,
                Arc::clone(&self.inner.subscriptions),
                self.inner.stop_after,
            )));
        }
        stream
    }

    /// Whether the shared upstream subscription is live.
    pub fn is_active(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// A fresh upstream seeded into `output`, or `None` if one is already
    /// running or the projection has ended.
    fn restart_source(&self, task: &Option<JoinHandle<()>>) -> Option<BoxStream<'static, M>> {
        if self.inner.output.is_closed() {
            return None;
        }
        if task.as_ref().is_some_and(|running| !running.is_finished()) {
            return None;
        }

        let mut source = (self.inner.upstream)();
        // The store yields its current state without waiting, so the first
        // item is always ready here.
        match source.next().now_or_never() {
            Some(Some(seed)) => {
                self.inner.output.replace(seed);
                Some(source)
            }
            _ => {
                self.inner.output.close();
                None
            }
        }
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M> Clone for Projection<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> Drop for ProjectionInner<M> {
    fn drop(&mut self) {
        if let Some(task) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

async fn run_upstream<M>(
    output: Arc<StateContainer<M>>,
    mut source: BoxStream<'static, M>,
    subscriptions: Arc<AtomicU64>,
    stop_after: Duration,
) where
    M: Clone + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            next = source.next() => match next {
                Some(model) => {
                    output.replace(model);
                }
                None => {
                    debug!("projection source ended");
                    output.close();
                    return;
                }
            },
            _ = output.unobserved() => {
                let seen = subscriptions.load(Ordering::SeqCst);
                tokio::time::sleep(stop_after).await;
                if output.observer_count() == 0 && subscriptions.load(Ordering::SeqCst) == seen {
                    debug!("projection upstream stopped, no observers");
                    return;
                }
            }
        }
    }
}
