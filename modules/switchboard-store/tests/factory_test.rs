//! Store construction through `create` and the `StoreConfig` builder.

use std::rc::Rc;
use std::sync::Arc;

use switchboard_store::{
    create, delegate_fn, BoxDelegate, Diagnostics, Lifecycle, RecordingLogger, StoreConfig,
    StoreError, StoreHandle,
};
use tokio::runtime::Handle;

#[derive(Debug, Clone, Default, PartialEq)]
struct Loading {
    is_loading: bool,
}

#[derive(Debug)]
enum LoadEvent {
    LoadData,
}

fn loader() -> BoxDelegate<Loading, LoadEvent> {
    delegate_fn(
        |event: &LoadEvent, store: &StoreHandle<Loading>, _scope, _state| match event {
            LoadEvent::LoadData => {
                store.set_state(Loading { is_loading: true });
                true
            }
        },
    )
}

#[tokio::test]
async fn create_initializes_by_default() {
    let store = create(
        StoreConfig::builder()
            .initial_state(Loading::default())
            .delegates(vec![loader()])
            .executor(Handle::current())
            .init_events(vec![LoadEvent::LoadData])
            .build(),
    );

    assert_eq!(store.lifecycle(), Lifecycle::Initialized);
    assert_eq!(store.state(), Loading { is_loading: true });
}

#[tokio::test]
async fn create_without_auto_init_leaves_store_constructed() {
    let store = create(
        StoreConfig::builder()
            .initial_state(Loading::default())
            .delegates(vec![loader()])
            .executor(Handle::current())
            .init_events(vec![LoadEvent::LoadData])
            .auto_init(false)
            .build(),
    );

    assert_eq!(store.lifecycle(), Lifecycle::Constructed);
    assert!(!store.state().is_loading);

    store.init();
    assert!(store.state().is_loading);
}

#[tokio::test]
async fn defaults_mean_no_init_events_and_no_diagnostics() {
    let store = create(
        StoreConfig::<Loading, LoadEvent>::builder()
            .initial_state(Loading::default())
            .delegates(vec![loader()])
            .executor(Handle::current())
            .build(),
    );

    assert_eq!(store.lifecycle(), Lifecycle::Initialized);
    assert_eq!(store.state(), Loading::default());
    assert_eq!(store.name(), "store");
}

#[tokio::test]
async fn diagnostics_carry_the_store_name() {
    let recorder = Arc::new(RecordingLogger::new());
    let store = create(
        StoreConfig::<Loading, LoadEvent>::builder()
            .initial_state(Loading::default())
            .delegates(vec![])
            .executor(Handle::current())
            .diagnostics(Diagnostics::new("loader", Arc::clone(&recorder)))
            .build(),
    );

    assert_eq!(store.name(), "loader");
    assert_eq!(
        recorder.errors(),
        vec![StoreError::NoDelegates {
            name: "loader".into()
        }]
    );
    assert!(recorder.saw("loader: initializing"));
}

#[tokio::test]
async fn events_need_not_be_thread_safe() {
    // Dispatch is synchronous on the caller's thread, so `Rc` payloads are fine.
    let renamer: BoxDelegate<String, Rc<str>> = delegate_fn(
        |event: &Rc<str>, store: &StoreHandle<String>, _scope, _state| {
            store.set_state(event.to_string());
            true
        },
    );
    let store = create(
        StoreConfig::builder()
            .initial_state(String::new())
            .delegates(vec![renamer])
            .executor(Handle::current())
            .init_events(vec![Rc::from("first")])
            .build(),
    );
    assert_eq!(store.state(), "first");

    store.accept(Rc::from("second"));
    assert_eq!(store.state(), "second");
}
