//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for retry behavior.
///
/// `max_attempts` counts every call, the first included, and is never
/// below one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of calls.
    pub max_attempts: u32,
    /// Pause after a retryable failure before the next call.
    pub delay: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration with no delay.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
        }
    }

    /// Creates a configuration that calls exactly once.
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Defaults for persistence calls: 3 attempts, 250 ms apart.
    pub fn persistence() -> Self {
        Self::new(3).with_delay(Duration::from_millis(250))
    }

    /// Defaults for replication calls: 5 attempts, 3 s apart.
    pub fn replication() -> Self {
        Self::new(5).with_delay(Duration::from_secs(3))
    }

    /// Sets the maximum number of calls (clamped to at least one).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the delay between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::persistence()
    }
}

/// Debounce settings for the sync that follows a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSyncConfig {
    /// Quiet period after the latest save before syncing.
    pub min_delay: Duration,
    /// Upper bound on how long the first pending save can wait.
    pub max_wait: Duration,
    /// Whether saves schedule a sync at all.
    pub enabled: bool,
}

impl AutoSyncConfig {
    /// Creates the default debounce: 10 s quiet period, 20 s cap.
    pub fn new() -> Self {
        Self {
            min_delay: Duration::from_secs(10),
            max_wait: Duration::from_secs(20),
            enabled: true,
        }
    }

    /// Disables sync after save.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Sets the quiet period.
    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    /// Sets the cap.
    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = wait;
        self
    }
}

impl Default for AutoSyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the coordinator and the cloud engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Retry settings for persistence calls.
    pub persistence_retry: RetryConfig,
    /// Retry settings for replication calls.
    pub replication_retry: RetryConfig,
    /// Capacity of the replication event queue.
    pub event_buffer: usize,
    /// Sync-after-save settings.
    pub auto_sync: AutoSyncConfig,
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            persistence_retry: RetryConfig::persistence(),
            replication_retry: RetryConfig::replication(),
            event_buffer: 64,
            auto_sync: AutoSyncConfig::new(),
        }
    }

    /// Sets the persistence retry configuration.
    pub fn with_persistence_retry(mut self, retry: RetryConfig) -> Self {
        self.persistence_retry = retry;
        self
    }

    /// Sets the replication retry configuration.
    pub fn with_replication_retry(mut self, retry: RetryConfig) -> Self {
        self.replication_retry = retry;
        self
    }

    /// Sets the event queue capacity (at least one).
    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size.max(1);
        self
    }

    /// Sets the sync-after-save configuration.
    pub fn with_auto_sync(mut self, auto_sync: AutoSyncConfig) -> Self {
        self.auto_sync = auto_sync;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_defaults() {
        let persistence = RetryConfig::persistence();
        assert_eq!(persistence.max_attempts, 3);
        assert_eq!(persistence.delay, Duration::from_millis(250));

        let replication = RetryConfig::replication();
        assert_eq!(replication.max_attempts, 5);
        assert_eq!(replication.delay, Duration::from_secs(3));
    }

    #[test]
    fn attempts_never_zero() {
        assert_eq!(RetryConfig::new(0).max_attempts, 1);
        assert_eq!(RetryConfig::new(4).with_max_attempts(0).max_attempts, 1);
        assert_eq!(RetryConfig::no_retry().delay, Duration::ZERO);
    }

    #[test]
    fn engine_builder() {
        let config = EngineConfig::new()
            .with_event_buffer(0)
            .with_auto_sync(AutoSyncConfig::disabled())
            .with_persistence_retry(RetryConfig::no_retry());
        assert_eq!(config.event_buffer, 1);
        assert!(!config.auto_sync.enabled);
        assert_eq!(config.persistence_retry.max_attempts, 1);
        assert_eq!(config.replication_retry.max_attempts, 5);
    }
}
