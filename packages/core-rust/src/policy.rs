//! Batch sizing for cursor fetches.

use crate::error::ConfigError;

/// Smallest batch requested from a cursor, even when demand is lower.
pub const DEFAULT_MIN_BATCH_SIZE: u32 = 50;

/// Largest batch requested from a cursor, even when demand is higher.
pub const DEFAULT_MAX_BATCH_SIZE: u32 = 10_000;

/// Maps sampled downstream demand to a cursor batch-size hint.
///
/// Demand below the floor still yields a floor-sized request so a slow
/// consumer never stalls the cursor; demand above the cap (including
/// unbounded demand, `u64::MAX`) is capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSizePolicy {
    min_batch_size: u32,
    max_batch_size: u32,
}

impl BatchSizePolicy {
    /// Creates a policy with custom bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroMinBatchSize`] if `min_batch_size` is zero and
    /// [`ConfigError::InvertedBatchBounds`] if it exceeds `max_batch_size`.
    pub fn new(min_batch_size: u32, max_batch_size: u32) -> Result<Self, ConfigError> {
        if min_batch_size == 0 {
            return Err(ConfigError::ZeroMinBatchSize);
        }
        if min_batch_size > max_batch_size {
            return Err(ConfigError::InvertedBatchBounds {
                min: min_batch_size,
                max: max_batch_size,
            });
        }
        Ok(Self {
            min_batch_size,
            max_batch_size,
        })
    }

    #[must_use]
    pub fn min_batch_size(&self) -> u32 {
        self.min_batch_size
    }

    #[must_use]
    pub fn max_batch_size(&self) -> u32 {
        self.max_batch_size
    }

    /// Returns `clamp(demand, min_batch_size, max_batch_size)`.
    #[must_use]
    pub fn clamp(&self, demand: u64) -> u32 {
        let capped = demand.min(u64::from(self.max_batch_size));
        u32::try_from(capped)
            .unwrap_or(self.max_batch_size)
            .max(self.min_batch_size)
    }
}

impl Default for BatchSizePolicy {
    fn default() -> Self {
        Self {
            min_batch_size: DEFAULT_MIN_BATCH_SIZE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}
