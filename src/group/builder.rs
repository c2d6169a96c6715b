use std::time::Duration;

use crate::group::Group;

/// Graceful phase used by [`Group::stop`] when no explicit deadline is given.
pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(1);

/// Builds a [`Group`] with configurable parameters.
pub struct GroupBuilder {
    graceful_timeout: Duration,
}

impl GroupBuilder {
    /// Creates a new builder with default configuration values.
    pub fn new() -> Self {
        Self {
            graceful_timeout: DEFAULT_GRACEFUL_TIMEOUT,
        }
    }

    /// Sets how long `stop(true)` waits for interrupted children before
    /// terminating them.
    pub fn with_graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }

    /// Constructs the `Group` with the configured settings.
    pub fn build(self) -> Group {
        Group::with_graceful_timeout(self.graceful_timeout)
    }
}

impl Default for GroupBuilder {
    fn default() -> Self {
        Self::new()
    }
}
