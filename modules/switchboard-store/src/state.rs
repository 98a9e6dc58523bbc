//! The state container: one current value, observable as a stream.

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::watch;

/// Stream of state values: the value current at subscription, then every
/// later replacement. Ends when the container is closed.
pub type StateStream<S> = BoxStream<'static, S>;

/// Holds the current immutable state and multicasts replacements.
///
/// Backed by a `watch` channel, so the writer never waits on observers. An
/// observer that falls behind skips intermediate values and resumes at the
/// latest one.
pub struct StateContainer<S> {
    tx: watch::Sender<S>,
    closed: watch::Sender<bool>,
}

impl<S> StateContainer<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(initial: S) -> Self {
        let (tx, _) = watch::channel(initial);
        let (closed, _) = watch::channel(false);
        Self { tx, closed }
    }

    /// The latest value. Never blocks for longer than a concurrent replace.
    pub fn current(&self) -> S {
        self.tx.borrow().clone()
    }

    /// Install `next` and wake every observer.
    ///
    /// Returns `false` without touching the value once the container is closed.
    pub fn replace(&self, next: S) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.send_replace(next);
        true
    }

    /// Subscribe. Each call yields an independent stream whose first item is
    /// the value current when `observe` was called, even if a replace lands
    /// before the stream is first polled.
    pub fn observe(&self) -> StateStream<S> {
        let mut rx = self.tx.subscribe();
        let closed = self.closed.subscribe();
        let attached = rx.borrow_and_update().clone();

        stream::unfold(
            (rx, closed, Some(attached)),
            |(mut rx, mut closed, attached)| async move {
                if *closed.borrow() {
                    return None;
                }
                if let Some(value) = attached {
                    return Some((value, (rx, closed, None)));
                }
                tokio::select! {
                    biased;
                    _ = closed.changed() => return None,
                    changed = rx.changed() => changed.ok()?,
                }
                let value = rx.borrow_and_update().clone();
                Some((value, (rx, closed, None)))
            },
        )
        .boxed()
    }

    /// Number of live observer streams.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Resolves when no observer stream is left. Immediately if there are none.
    pub async fn unobserved(&self) {
        self.tx.closed().await;
    }

    /// Tear down: end every observer stream and refuse further replaces.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}
