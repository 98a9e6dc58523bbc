//! Logger implementations and the optional diagnostics capability.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info};

use crate::error::StoreError;
use crate::traits::Logger;

// ---------------------------------------------------------------------------
// Diagnostics — name + logger, present or absent as one value
// ---------------------------------------------------------------------------

/// A named logger. A store either has one or logs nothing at all.
#[derive(Clone)]
pub struct Diagnostics {
    name: String,
    logger: Arc<dyn Logger>,
}

impl Diagnostics {
    pub fn new(name: impl Into<String>, logger: impl Logger + 'static) -> Self {
        Self {
            name: name.into(),
            logger: Arc::new(logger),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Log `message` prefixed with the store name.
    pub(crate) fn log(&self, message: impl fmt::Display) {
        self.logger.log(&format!("{}: {}", self.name, message));
    }

    pub(crate) fn throw_if_debug(&self, error: StoreError) {
        self.logger.throw_if_debug(error);
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// TracingLogger (production)
// ---------------------------------------------------------------------------

/// Forwards diagnostics to `tracing`.
///
/// `throw_if_debug` panics when built with debug assertions, unless the
/// logger was made [`lenient`](TracingLogger::lenient).
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    lenient: bool,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never panic; report assertions as `error!` in every build.
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }
}

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        info!(target: "switchboard", "{message}");
    }

    fn throw_if_debug(&self, error: StoreError) {
        if cfg!(debug_assertions) && !self.lenient {
            panic!("{error}");
        }
        error!(target: "switchboard", error = %error, "store assertion failed");
    }
}

// ---------------------------------------------------------------------------
// RecordingLogger (tests — keeps everything in memory)
// ---------------------------------------------------------------------------

/// In-memory logger for testing. Records every line and every assertion.
/// Thread-safe; share it through `Arc` to inspect after the store ran.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<String>>,
    errors: Mutex<Vec<StoreError>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All logged lines, in order.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All `throw_if_debug` reports, in order.
    pub fn errors(&self) -> Vec<StoreError> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True if any logged line contains `needle`.
    pub fn saw(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl Logger for RecordingLogger {
    fn log(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }

    fn throw_if_debug(&self, error: StoreError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }
}

// ---------------------------------------------------------------------------
// Arc<L> blanket — lets tests keep a handle on the recorder
// ---------------------------------------------------------------------------

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn log(&self, message: &str) {
        (**self).log(message)
    }

    fn throw_if_debug(&self, error: StoreError) {
        (**self).throw_if_debug(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_prefix_lines_with_name() {
        let recorder = Arc::new(RecordingLogger::new());
        let diagnostics = Diagnostics::new("cart", Arc::clone(&recorder));

        diagnostics.log("initializing");

        assert_eq!(recorder.lines(), vec!["cart: initializing"]);
    }

    #[test]
    fn recorder_keeps_assertions_separate_from_lines() {
        let recorder = RecordingLogger::new();
        recorder.log("hello");
        recorder.throw_if_debug(StoreError::NoDelegates { name: "x".into() });

        assert_eq!(recorder.lines().len(), 1);
        assert_eq!(
            recorder.errors(),
            vec![StoreError::NoDelegates { name: "x".into() }]
        );
    }

    #[test]
    fn lenient_tracing_logger_does_not_panic() {
        let logger = TracingLogger::new().lenient();
        logger.throw_if_debug(StoreError::Unhandled {
            name: "x".into(),
            event: "Ping".into(),
        });
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "no event delegates")]
    fn strict_tracing_logger_panics_in_debug() {
        TracingLogger::new().throw_if_debug(StoreError::NoDelegates { name: "x".into() });
    }
}
