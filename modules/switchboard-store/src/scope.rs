//! Lifetime-bound concurrency scope shared by every delegate of a store.
//!
//! All asynchronous work a delegate starts is spawned here, onto the runtime
//! handle the store was built with. Cancelling the scope aborts every child,
//! including children spawned by other children. A child that panics or
//! returns an error is reported and reaped; its siblings keep running.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, error};

/// Cloneable handle to the store's task scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    name: String,
    handle: Handle,
    tasks: Mutex<JoinSet<()>>,
    cancelled: watch::Sender<bool>,
}

impl Scope {
    pub(crate) fn new(name: impl Into<String>, handle: Handle) -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            inner: Arc::new(ScopeInner {
                name: name.into(),
                handle,
                tasks: Mutex::new(JoinSet::new()),
                cancelled,
            }),
        }
    }

    /// Spawn `task` as a child of this scope.
    ///
    /// Returns `None` and drops the future unpolled if the scope is already
    /// cancelled. The returned handle aborts just this child.
    pub fn spawn<F>(&self, task: F) -> Option<AbortHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock_tasks();
        // Checked under the lock so a concurrent cancel cannot miss this child.
        if self.is_cancelled() {
            debug!(scope = %self.inner.name, "spawn after cancel ignored");
            return None;
        }
        self.reap(&mut tasks);
        Some(tasks.spawn_on(task, &self.inner.handle))
    }

    /// Like [`spawn`](Scope::spawn), for work that can fail. An `Err` is logged
    /// and otherwise dropped.
    pub fn spawn_fallible<F>(&self, task: F) -> Option<AbortHandle>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = self.inner.name.clone();
        self.spawn(async move {
            if let Err(err) = task.await {
                error!(scope = %name, error = %err, "scoped task failed");
            }
        })
    }

    /// Resolves once the scope is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.cancelled.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.borrow()
    }

    /// Children that have not finished yet.
    pub fn active_tasks(&self) -> usize {
        let mut tasks = self.lock_tasks();
        self.reap(&mut tasks);
        tasks.len()
    }

    /// Abort every child and refuse new ones. Safe to call more than once.
    pub(crate) fn cancel(&self) {
        let mut tasks = self.lock_tasks();
        self.inner.cancelled.send_replace(true);
        tasks.abort_all();
        self.reap(&mut tasks);
    }

    fn lock_tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn reap(&self, tasks: &mut JoinSet<()>) {
        while let Some(result) = tasks.try_join_next() {
            if let Err(err) = result {
                if err.is_panic() {
                    error!(scope = %self.inner.name, "scoped task panicked");
                }
            }
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.inner.name)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn scope() -> Scope {
        Scope::new("test", Handle::current())
    }

    #[tokio::test]
    async fn spawned_work_runs() {
        let scope = scope();
        let (tx, rx) = tokio::sync::oneshot::channel();

        scope.spawn(async move {
            let _ = tx.send(42);
        });

        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_nested_children() {
        let scope = scope();
        let finished = Arc::new(AtomicUsize::new(0));

        let outer_scope = scope.clone();
        let outer_finished = Arc::clone(&finished);
        scope.spawn(async move {
            let inner_finished = Arc::clone(&outer_finished);
            outer_scope.spawn(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                inner_finished.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_secs(10)).await;
            outer_finished.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scope.active_tasks(), 2);

        scope.cancel();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn spawn_after_cancel_is_refused() {
        let scope = scope();
        scope.cancel();

        assert!(scope.spawn(async {}).is_none());
        assert_eq!(scope.active_tasks(), 0);
    }

    #[tokio::test]
    async fn panicking_child_does_not_take_down_siblings() {
        let scope = scope();
        let (tx, rx) = tokio::sync::oneshot::channel();

        scope.spawn(async {
            panic!("boom");
        });
        scope.spawn_fallible(async { Err(anyhow::anyhow!("bad fetch")) });
        scope.spawn(async move {
            tokio::task::yield_now().await;
            let _ = tx.send("sibling done");
        });

        assert_eq!(rx.await.unwrap(), "sibling done");
        assert!(!scope.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_on_cancel() {
        let scope = scope();
        let waiter = scope.clone();
        let join = tokio::spawn(async move { waiter.cancelled().await });

        scope.cancel();
        join.await.unwrap();
    }
}
