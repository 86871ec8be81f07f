//! Injected diagnostic sink for chain failures.
//!
//! The engine takes a sink at construction instead of reaching for a global
//! logger, so tests can capture failure events deterministically. Exactly one
//! event is emitted per failed chain.

use std::io;
use std::sync::Mutex;

use tracing::{Level, event};

/// Receives one event per failed transfer chain.
pub trait DiagnosticSink: Send + Sync {
    /// A chain aborted. `message` describes the transfer; `cause` is the
    /// underlying I/O error.
    fn chain_failed(&self, message: &str, cause: &io::Error);
}

/// Default sink: routes failures to `tracing` at error level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn chain_failed(&self, message: &str, cause: &io::Error) {
        event!(Level::ERROR, %cause, "{message}");
    }
}

/// Sink that records events in memory, for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, in arrival order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl DiagnosticSink for MemorySink {
    fn chain_failed(&self, message: &str, cause: &io::Error) {
        if let Ok(mut events) = self.events.lock() {
            events.push(format!("{message}: {cause}"));
        }
    }
}
