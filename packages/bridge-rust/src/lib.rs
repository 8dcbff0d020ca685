//! rongo — reactive streams and deferred values over callback-driven
//! cursor APIs.
//!
//! - [`Deferred`] turns a single-result callback operation into a lazy value
//!   that can be subscribed to or awaited.
//! - [`CursorStreamBridge`] drains a [`PaginatedCursor`] into a push stream
//!   that honours subscriber demand.
//! - [`CursorStream`] acquires a cursor per subscriber and drains it.
//! - [`ReactiveCollection`] applies both to a whole collection driver.
//! - [`PublisherExt`] adapts any push stream to a `futures` [`Stream`].
//!
//! [`Stream`]: futures_util::Stream

pub mod adapter;
pub mod collection;
pub mod config;
pub mod cursor_stream;
pub mod factory;
pub mod memory;
pub mod single;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{ItemStream, PublisherExt};
pub use collection::{FindSource, FindStream, ReactiveCollection};
pub use config::StreamConfig;
pub use cursor_stream::{BridgeState, CursorStreamBridge};
pub use factory::{CursorStream, SourceItem};
pub use memory::{CursorProbe, ParkedFetch, ScriptedCursor, Step, VecCursor, VecSource};
pub use single::Deferred;

pub use rongo_core::{
    AsyncCollection, BatchSizePolicy, BridgeError, Callback, CallbackDropped, ConfigError,
    CursorSource, FetchCallback, InertSubscription, PaginatedCursor, Publisher,
    SingleResultOperation, Subscriber, Subscription, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MIN_BATCH_SIZE,
};
