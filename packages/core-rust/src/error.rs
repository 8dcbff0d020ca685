//! Error taxonomy for streams and deferred values.
//!
//! Provider failures arrive as `anyhow::Error` and are carried unmodified
//! inside the variant naming the stage that failed.

/// Terminal failure delivered to a stream subscriber or deferred consumer.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The cursor failed while fetching a batch.
    #[error("cursor fetch failed: {0}")]
    CursorFetch(#[source] anyhow::Error),
    /// Obtaining the cursor failed; no item was emitted.
    #[error("cursor acquisition failed: {0}")]
    Acquisition(#[source] anyhow::Error),
    /// A single-result operation failed.
    #[error("operation failed: {0}")]
    Operation(#[source] anyhow::Error),
}

impl BridgeError {
    /// Wraps a single-result operation failure.
    ///
    /// An error that already is a `BridgeError` (for example a stream failure
    /// routed through a deferred value) keeps its original variant.
    #[must_use]
    pub fn operation(error: anyhow::Error) -> Self {
        match error.downcast::<BridgeError>() {
            Ok(bridge) => bridge,
            Err(other) => Self::Operation(other),
        }
    }

    /// Returns the provider error exactly as it was reported.
    #[must_use]
    pub fn into_source(self) -> anyhow::Error {
        match self {
            Self::CursorFetch(e) | Self::Acquisition(e) | Self::Operation(e) => e,
        }
    }

    /// Borrows the provider error exactly as it was reported.
    #[must_use]
    pub fn source_error(&self) -> &anyhow::Error {
        match self {
            Self::CursorFetch(e) | Self::Acquisition(e) | Self::Operation(e) => e,
        }
    }
}

/// Errors from validating bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("minimum batch size must be at least 1")]
    ZeroMinBatchSize,
    #[error("minimum batch size {min} exceeds maximum batch size {max}")]
    InvertedBatchBounds { min: u32, max: u32 },
    #[error("stream prefetch must be at least 1")]
    ZeroPrefetch,
}
