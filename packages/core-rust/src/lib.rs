//! rongo core — provider traits, push-stream protocol, errors, and batch sizing.

pub mod callback;
pub mod error;
pub mod policy;
pub mod traits;

pub use callback::{Callback, CallbackDropped};
pub use error::{BridgeError, ConfigError};
pub use policy::{BatchSizePolicy, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MIN_BATCH_SIZE};
pub use traits::{
    AsyncCollection, CursorSource, FetchCallback, InertSubscription, PaginatedCursor, Publisher,
    SingleResultOperation, Subscriber, Subscription,
};
