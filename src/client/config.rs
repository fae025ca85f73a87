//! Engine configuration and builder.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{DEFAULT_DEDUPE_WINDOW, DEFAULT_EVENT_CAPACITY, ErrorNotifier};
use crate::sync::{CoordinatorConfig, EntityReader, ToggleEndpoint};

use super::engine::ToggleEngine;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Toggles on one entity within this window share one request.
    pub dedupe_window: Duration,

    /// Overall deadline for each remote call.
    pub request_timeout: Option<Duration>,

    /// Fetch canonical state after a failed toggle.
    pub reconcile_on_failure: bool,

    /// Capacity of the store change feed.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedupe_window: DEFAULT_DEDUPE_WINDOW,
            request_timeout: None,
            reconcile_on_failure: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Coordinator settings derived from this configuration.
    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            dedupe_window: self.dedupe_window,
            request_timeout: self.request_timeout,
            reconcile_on_failure: self.reconcile_on_failure,
        }
    }
}

/// Builder for creating a [`ToggleEngine`].
///
/// ```
/// use std::time::Duration;
/// use toggle_sync::client::ToggleEngineBuilder;
///
/// let builder = ToggleEngineBuilder::new()
///     .dedupe_window(Duration::from_millis(300))
///     .request_timeout(Duration::from_secs(5));
/// assert_eq!(builder.config().dedupe_window, Duration::from_millis(300));
/// ```
pub struct ToggleEngineBuilder {
    config: EngineConfig,
    notifier: Option<Arc<dyn ErrorNotifier>>,
}

impl ToggleEngineBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            notifier: None,
        }
    }

    /// Start from an existing configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            notifier: None,
        }
    }

    /// Set the dedupe window.
    pub fn dedupe_window(mut self, window: Duration) -> Self {
        self.config.dedupe_window = window;
        self
    }

    /// Set the per-request deadline.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Enable or disable reconciliation after failures.
    pub fn reconcile_on_failure(mut self, enabled: bool) -> Self {
        self.config.reconcile_on_failure = enabled;
        self
    }

    /// Set the change feed capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Route user-visible failures to `notifier`.
    pub fn notifier(mut self, notifier: impl ErrorNotifier + 'static) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the engine over the given remote collaborators.
    pub fn build(
        self,
        endpoint: Arc<dyn ToggleEndpoint>,
        reader: Arc<dyn EntityReader>,
    ) -> ToggleEngine {
        ToggleEngine::new(self.config, endpoint, reader, self.notifier)
    }
}

impl Default for ToggleEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ToggleEngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToggleEngineBuilder")
            .field("config", &self.config)
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}
