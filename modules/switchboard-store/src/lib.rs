//! Event-routed state store.
//!
//! Holds one immutable state value, routes each accepted event to the first
//! delegate that claims it, and republishes every new state to observers.
//! Delegate work that outlives a dispatch runs on the store's scope and is
//! cancelled when the store is disposed.
//!
//! Consumers define their domain by implementing `Delegate` (or passing
//! closures to `delegate_fn`) and build stores through `create`.

pub mod delegate;
pub mod engine;
pub mod error;
pub mod factory;
pub mod logger;
pub mod projection;
pub mod scope;
pub mod state;
pub mod traits;

pub use delegate::{delegate_fn, BoxDelegate, StateAccessor};
pub use engine::{Lifecycle, Store, StoreHandle};
pub use error::StoreError;
pub use factory::{create, StoreConfig};
pub use logger::{Diagnostics, RecordingLogger, TracingLogger};
pub use projection::Projection;
pub use scope::Scope;
pub use state::{StateContainer, StateStream};
pub use traits::{Delegate, Logger};
