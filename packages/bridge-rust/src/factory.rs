//! Streams that acquire their own cursor.
//!
//! [`CursorStream`] composes the two bridges: each subscription acquires a
//! cursor through a deferred call to the [`CursorSource`], then drains it
//! through a fresh [`CursorStreamBridge`].

use std::sync::Arc;

use rongo_core::{
    BatchSizePolicy, BridgeError, Callback, CursorSource, InertSubscription, PaginatedCursor,
    Publisher, Subscriber, Subscription,
};
use tracing::{debug, warn};

use crate::cursor_stream::CursorStreamBridge;
use crate::single::Deferred;

/// Item type produced by a source's cursors.
pub type SourceItem<S> = <<S as CursorSource>::Cursor as PaginatedCursor>::Item;

/// Cold stream over a [`CursorSource`].
///
/// Every subscriber triggers its own acquisition and gets its own cursor.
pub struct CursorStream<S> {
    source: Arc<S>,
    policy: BatchSizePolicy,
}

impl<S: CursorSource> CursorStream<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self::from_arc(Arc::new(source))
    }

    #[must_use]
    pub fn from_arc(source: Arc<S>) -> Self {
        Self {
            source,
            policy: BatchSizePolicy::default(),
        }
    }

    /// Sizes the fetches of every cursor this stream drains with `policy`.
    #[must_use]
    pub fn with_policy(mut self, policy: BatchSizePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Deferred acquisition of a cursor from the source.
    pub fn acquire(&self) -> Deferred<S::Cursor> {
        let source = Arc::clone(&self.source);
        Deferred::new(move |callback| source.open(callback))
    }

    /// First item of the result set, or `None` when it is empty.
    ///
    /// Requests a single item and cancels the stream (closing the cursor) as
    /// soon as it arrives.
    pub fn first(&self) -> Deferred<Option<SourceItem<S>>> {
        let stream = self.clone();
        Deferred::new(move |callback| {
            stream.subscribe(Box::new(FirstSubscriber {
                callback: Some(callback),
                subscription: None,
            }));
        })
    }
}

impl<S> Clone for CursorStream<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            policy: self.policy,
        }
    }
}

impl<S: CursorSource> Publisher<SourceItem<S>> for CursorStream<S> {
    fn subscribe(&self, mut subscriber: Box<dyn Subscriber<SourceItem<S>>>) {
        let policy = self.policy;
        self.acquire().on_result(move |acquired| match acquired {
            Ok(cursor) => {
                debug!("cursor acquired");
                CursorStreamBridge::with_policy(cursor, policy).attach(subscriber);
            }
            Err(error) => {
                let error = BridgeError::Acquisition(error.into_source());
                warn!(error = %error, "cursor acquisition failed");
                subscriber.on_subscribe(Arc::new(InertSubscription));
                subscriber.on_error(error);
            }
        });
    }
}

// ---------------------------------------------------------------------------
// FirstSubscriber
// ---------------------------------------------------------------------------

struct FirstSubscriber<T> {
    callback: Option<Callback<Option<T>>>,
    subscription: Option<Arc<dyn Subscription>>,
}

impl<T: Send + 'static> Subscriber<T> for FirstSubscriber<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.subscription = Some(Arc::clone(&subscription));
        subscription.request(1);
    }

    fn on_next(&mut self, item: T) {
        if let Some(callback) = self.callback.take() {
            if let Some(subscription) = self.subscription.take() {
                subscription.cancel();
            }
            callback.success(Some(item));
        }
    }

    fn on_error(&mut self, error: BridgeError) {
        self.subscription = None;
        if let Some(callback) = self.callback.take() {
            callback.failure(error);
        }
    }

    fn on_complete(&mut self) {
        self.subscription = None;
        if let Some(callback) = self.callback.take() {
            callback.success(None);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
