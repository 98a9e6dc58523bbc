//! Item list domain: state, events, delegates and the item source boundary.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use switchboard_store::{BoxDelegate, Delegate, Scope, StateAccessor, StoreHandle};
use tokio::task::AbortHandle;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// State and events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemsState {
    pub is_loading: bool,
    pub items: Vec<String>,
    pub selected: Option<usize>,
    pub error: Option<String>,
    pub last_loaded: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemsEvent {
    /// Load unless a load is already running.
    Load,
    /// Drop any running load and start over.
    Refresh,
    Clear,
    Select(usize),
}

/// One-line rendering of the state, used as the projected view model.
pub fn summary(state: &ItemsState) -> String {
    if state.is_loading {
        return "loading...".to_string();
    }
    if let Some(error) = &state.error {
        return format!("error: {error}");
    }
    match state.selected.and_then(|i| state.items.get(i)) {
        Some(item) => format!("{} items, selected {item}", state.items.len()),
        None => format!("{} items", state.items.len()),
    }
}

// ---------------------------------------------------------------------------
// ItemSource — where items come from
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<String>>;
}

/// Fixed list served after a delay.
pub struct FixtureSource {
    items: Vec<String>,
    delay: Duration,
}

impl FixtureSource {
    pub fn new(items: Vec<String>, delay: Duration) -> Self {
        Self { items, delay }
    }
}

#[async_trait]
impl ItemSource for FixtureSource {
    async fn fetch(&self) -> Result<Vec<String>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.items.clone())
    }
}

// ---------------------------------------------------------------------------
// LoadDelegate — Load / Refresh
// ---------------------------------------------------------------------------

/// Fetches items on the store scope. Keeps at most one fetch in flight.
pub struct LoadDelegate {
    source: Arc<dyn ItemSource>,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl LoadDelegate {
    pub fn new(source: Arc<dyn ItemSource>) -> Self {
        Self {
            source,
            in_flight: Mutex::new(None),
        }
    }
}

impl Delegate<ItemsState, ItemsEvent> for LoadDelegate {
    fn handle(
        &self,
        event: &ItemsEvent,
        store: &StoreHandle<ItemsState>,
        scope: &Scope,
        state: &StateAccessor<ItemsState>,
    ) -> bool {
        match event {
            ItemsEvent::Load if state.get().is_loading => return true,
            ItemsEvent::Load | ItemsEvent::Refresh => {}
            _ => return false,
        }

        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = in_flight.take() {
            previous.abort();
        }

        store.update_state(|s| ItemsState {
            is_loading: true,
            error: None,
            ..s.clone()
        });

        let source = Arc::clone(&self.source);
        let store = store.clone();
        *in_flight = scope.spawn(async move {
            match source.fetch().await {
                Ok(items) => {
                    info!(count = items.len(), "items loaded");
                    store.update_state(move |s| ItemsState {
                        is_loading: false,
                        selected: s.selected.filter(|i| *i < items.len()),
                        items,
                        error: None,
                        last_loaded: Some(Utc::now()),
                    });
                }
                Err(err) => {
                    warn!(error = %err, "item fetch failed");
                    store.update_state(|s| ItemsState {
                        is_loading: false,
                        error: Some(err.to_string()),
                        ..s.clone()
                    });
                }
            }
        });
        true
    }
}

// ---------------------------------------------------------------------------
// EditDelegate — Clear / Select
// ---------------------------------------------------------------------------

pub struct EditDelegate;

impl Delegate<ItemsState, ItemsEvent> for EditDelegate {
    fn handle(
        &self,
        event: &ItemsEvent,
        store: &StoreHandle<ItemsState>,
        _scope: &Scope,
        _state: &StateAccessor<ItemsState>,
    ) -> bool {
        match event {
            ItemsEvent::Clear => {
                store.update_state(|s| ItemsState {
                    items: Vec::new(),
                    selected: None,
                    ..s.clone()
                });
                true
            }
            ItemsEvent::Select(index) => {
                let index = *index;
                store.update_state(|s| ItemsState {
                    selected: (index < s.items.len()).then_some(index).or(s.selected),
                    ..s.clone()
                });
                true
            }
            _ => false,
        }
    }
}

/// Delegates in dispatch order.
pub fn delegates(source: Arc<dyn ItemSource>) -> Vec<BoxDelegate<ItemsState, ItemsEvent>> {
    vec![Box::new(LoadDelegate::new(source)), Box::new(EditDelegate)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchboard_store::{Diagnostics, RecordingLogger, Store};
    use tokio::runtime::Handle;

    struct CountingSource {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl ItemSource for CountingSource {
        async fn fetch(&self) -> Result<Vec<String>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            Ok(vec![format!("batch-{call}-a"), format!("batch-{call}-b")])
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ItemSource for FailingSource {
        async fn fetch(&self) -> Result<Vec<String>> {
            anyhow::bail!("backend unavailable")
        }
    }

    fn store_with(source: Arc<dyn ItemSource>) -> (Store<ItemsState, ItemsEvent>, Arc<RecordingLogger>) {
        let recorder = Arc::new(RecordingLogger::new());
        let store = Store::new(
            ItemsState::default(),
            delegates(source),
            vec![ItemsEvent::Load],
            Handle::current(),
            Some(Diagnostics::new("items", Arc::clone(&recorder))),
        );
        (store, recorder)
    }

    fn counting(delay_ms: u64) -> Arc<CountingSource> {
        Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(delay_ms),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn init_starts_loading_then_fills_items() {
        let (store, recorder) = store_with(counting(100));

        store.init();
        assert!(store.state().is_loading);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let state = store.state();
        assert!(!state.is_loading);
        assert_eq!(state.items, vec!["batch-1-a", "batch-1-b"]);
        assert!(state.last_loaded.is_some());
        assert!(recorder.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn load_while_loading_does_not_fetch_twice() {
        let source = counting(100);
        let (store, _) = store_with(source.clone());

        store.init();
        store.accept(ItemsEvent::Load);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_replaces_the_running_fetch() {
        let source = counting(100);
        let (store, _) = store_with(source.clone());

        store.init();
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.accept(ItemsEvent::Refresh);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.state().items, vec!["batch-2-a", "batch-2-b"]);
        assert_eq!(store.scope().active_tasks(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_lands_as_error_state() {
        let (store, _) = store_with(Arc::new(FailingSource));

        store.init();
        let mut stream = store.observe();
        let mut last = None;
        while let Some(state) = futures::StreamExt::next(&mut stream).await {
            if !state.is_loading {
                last = Some(state);
                break;
            }
        }

        let state = last.unwrap();
        assert_eq!(state.error.as_deref(), Some("backend unavailable"));
        assert_eq!(summary(&state), "error: backend unavailable");
    }

    #[tokio::test(start_paused = true)]
    async fn select_and_clear_edit_the_list() {
        let (store, _) = store_with(counting(10));
        store.init();
        tokio::time::sleep(Duration::from_millis(20)).await;

        store.accept(ItemsEvent::Select(1));
        assert_eq!(summary(&store.state()), "2 items, selected batch-1-b");

        store.accept(ItemsEvent::Select(9));
        assert_eq!(store.state().selected, Some(1));

        store.accept(ItemsEvent::Clear);
        assert_eq!(summary(&store.state()), "0 items");
    }
}
