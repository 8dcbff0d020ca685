//! Consumer-side stream configuration.

use rongo_core::ConfigError;

/// Controls how an [`ItemStream`](crate::adapter::ItemStream) signals demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Items requested up front. `u64::MAX` requests everything at once.
    pub prefetch: u64,
}

impl StreamConfig {
    /// Creates a config with the given prefetch.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroPrefetch`] if `prefetch` is zero.
    pub fn new(prefetch: u64) -> Result<Self, ConfigError> {
        if prefetch == 0 {
            return Err(ConfigError::ZeroPrefetch);
        }
        Ok(Self { prefetch })
    }

    /// Config that requests unbounded demand.
    #[must_use]
    pub fn unbounded() -> Self {
        Self { prefetch: u64::MAX }
    }

    /// Number of consumed items after which demand is replenished.
    ///
    /// Three quarters of the prefetch, so more items are already on their way
    /// before the consumer runs dry. Unbounded prefetch never replenishes.
    #[must_use]
    pub fn refill_threshold(&self) -> u64 {
        if self.prefetch == u64::MAX {
            return u64::MAX;
        }
        (self.prefetch - self.prefetch / 4).max(1)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { prefetch: 256 }
    }
}
