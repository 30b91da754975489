//! Shared application state injected into the core handlers and middleware.

use std::sync::Arc;

use super::clock::MonotonicClock;
use crate::config::ProcessConfig;

/// State shared by the core handlers and middleware.
///
/// Route groups do not see this; they receive the data-access façade at
/// construction instead. Every field is `Arc`-backed so Axum can clone the
/// state per request cheaply.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Immutable process configuration.
    pub config: Arc<ProcessConfig>,
    /// Clock for health and diagnostic timestamps.
    pub clock: Arc<MonotonicClock>,
}

impl AppState {
    pub fn new(config: Arc<ProcessConfig>) -> Self {
        Self {
            config,
            clock: Arc::new(MonotonicClock::new()),
        }
    }
}
