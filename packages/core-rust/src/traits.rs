use std::sync::Arc;

use crate::callback::Callback;
use crate::error::BridgeError;

// ---------------------------------------------------------------------------
// Upstream: callback-driven providers
// ---------------------------------------------------------------------------

/// Continuation for one cursor fetch. `Ok(None)` or an empty batch marks the
/// end of the result set.
pub type FetchCallback<T> = Callback<Option<Vec<T>>>;

/// Server-held result set retrieved in bounded batches.
///
/// At most one `fetch_next` may be outstanding at a time. Once handed to a
/// stream the cursor is owned by it; no other code calls these methods.
pub trait PaginatedCursor: Send + 'static {
    /// Type of the items in each batch.
    type Item: Send + 'static;

    /// Hint for the number of items the next fetch should return.
    fn set_batch_size(&mut self, batch_size: u32);

    /// Fetch the next batch. The callback may run synchronously, before this
    /// method returns, or later from another thread.
    fn fetch_next(&mut self, callback: FetchCallback<Self::Item>);

    /// Release the server-side cursor.
    fn close(&mut self);
}

/// A single asynchronous operation that reports exactly one result.
pub trait SingleResultOperation<T>: Send + 'static {
    /// Begin the operation; `callback` receives its outcome.
    fn start(self, callback: Callback<T>);
}

impl<T, F> SingleResultOperation<T> for F
where
    F: FnOnce(Callback<T>) + Send + 'static,
{
    fn start(self, callback: Callback<T>) {
        self(callback);
    }
}

/// Query descriptor that can open a fresh cursor for each subscription.
pub trait CursorSource: Send + Sync + 'static {
    type Cursor: PaginatedCursor;

    /// Asynchronously obtain a cursor over the query's results.
    fn open(&self, callback: Callback<Self::Cursor>);
}

/// Callback-style collection driver.
///
/// Filters, updates, documents and write results are opaque to this crate;
/// encoding them is the driver's concern.
pub trait AsyncCollection: Send + Sync + 'static {
    type Document: Send + 'static;
    type Filter: Clone + Send + Sync + 'static;
    type Update: Send + 'static;
    type DeleteResult: Send + 'static;
    type UpdateResult: Send + 'static;
    type Cursor: PaginatedCursor<Item = Self::Document>;

    /// Fully qualified `database.collection` name.
    fn namespace(&self) -> &str;

    /// Count documents, optionally restricted to those matching `filter`.
    fn count(&self, filter: Option<Self::Filter>, callback: Callback<u64>);

    fn delete_one(&self, filter: Self::Filter, callback: Callback<Self::DeleteResult>);

    fn delete_many(&self, filter: Self::Filter, callback: Callback<Self::DeleteResult>);

    /// Open a cursor over documents matching `filter` (all when `None`).
    fn find(&self, filter: Option<Self::Filter>, callback: Callback<Self::Cursor>);

    fn find_one_and_delete(
        &self,
        filter: Self::Filter,
        callback: Callback<Option<Self::Document>>,
    );

    fn find_one_and_replace(
        &self,
        filter: Self::Filter,
        replacement: Self::Document,
        callback: Callback<Option<Self::Document>>,
    );

    fn find_one_and_update(
        &self,
        filter: Self::Filter,
        update: Self::Update,
        callback: Callback<Option<Self::Document>>,
    );

    fn insert_one(&self, document: Self::Document, callback: Callback<()>);

    fn insert_many(&self, documents: Vec<Self::Document>, callback: Callback<()>);

    fn replace_one(
        &self,
        filter: Self::Filter,
        replacement: Self::Document,
        callback: Callback<Self::UpdateResult>,
    );

    fn update_one(
        &self,
        filter: Self::Filter,
        update: Self::Update,
        callback: Callback<Self::UpdateResult>,
    );

    fn update_many(
        &self,
        filter: Self::Filter,
        update: Self::Update,
        callback: Callback<Self::UpdateResult>,
    );
}

// ---------------------------------------------------------------------------
// Downstream: push-stream protocol
// ---------------------------------------------------------------------------

/// Handle a subscriber uses to signal demand or stop the stream.
pub trait Subscription: Send + Sync {
    /// Add `n` to the outstanding demand. `u64::MAX` means unbounded.
    fn request(&self, n: u64);

    /// Stop the stream. No further signals are delivered afterwards.
    fn cancel(&self);
}

/// Consumer of a push stream.
///
/// Receives `on_subscribe` first, then zero or more `on_next`, then exactly
/// one of `on_complete` / `on_error` unless the subscription was cancelled.
pub trait Subscriber<T>: Send + 'static {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>);

    fn on_next(&mut self, item: T);

    fn on_error(&mut self, error: BridgeError);

    fn on_complete(&mut self);
}

/// Source of a push stream.
pub trait Publisher<T>: Send + Sync {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>);
}

/// Subscription that ignores demand and cancellation.
///
/// Handed to subscribers whose stream terminates immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct InertSubscription;

impl Subscription for InertSubscription {
    fn request(&self, _n: u64) {}

    fn cancel(&self) {}
}
