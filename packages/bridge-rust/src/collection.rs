//! Reactive facade over a callback-driven collection driver.
//!
//! Every single-result operation becomes a [`Deferred`]; `find` becomes a
//! cold [`FindStream`] that opens a new cursor per subscriber.

use std::sync::Arc;

use rongo_core::{AsyncCollection, Callback, CursorSource};

use crate::factory::CursorStream;
use crate::single::Deferred;

/// Stream of documents matching a `find` filter.
pub type FindStream<C> = CursorStream<FindSource<C>>;

/// Wraps an [`AsyncCollection`] so its operations compose as deferreds and
/// streams instead of nested callbacks.
pub struct ReactiveCollection<C> {
    collection: Arc<C>,
}

impl<C> Clone for ReactiveCollection<C> {
    fn clone(&self) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
        }
    }
}

impl<C: AsyncCollection> ReactiveCollection<C> {
    #[must_use]
    pub fn new(collection: C) -> Self {
        Self::from_arc(Arc::new(collection))
    }

    #[must_use]
    pub fn from_arc(collection: Arc<C>) -> Self {
        Self { collection }
    }

    /// The wrapped driver collection.
    #[must_use]
    pub fn inner(&self) -> &Arc<C> {
        &self.collection
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.collection.namespace()
    }

    fn defer<T, F>(&self, op: F) -> Deferred<T>
    where
        T: Send + 'static,
        F: FnOnce(&C, Callback<T>) + Send + 'static,
    {
        let collection = Arc::clone(&self.collection);
        Deferred::new(move |callback| op(collection.as_ref(), callback))
    }

    /// Number of documents in the collection.
    pub fn count(&self) -> Deferred<u64> {
        self.defer(|c, cb| c.count(None, cb))
    }

    /// Number of documents matching `filter`.
    pub fn count_matching(&self, filter: C::Filter) -> Deferred<u64> {
        self.defer(move |c, cb| c.count(Some(filter), cb))
    }

    pub fn delete_one(&self, filter: C::Filter) -> Deferred<C::DeleteResult> {
        self.defer(move |c, cb| c.delete_one(filter, cb))
    }

    pub fn delete_many(&self, filter: C::Filter) -> Deferred<C::DeleteResult> {
        self.defer(move |c, cb| c.delete_many(filter, cb))
    }

    /// Documents matching `filter`, or every document when `None`.
    ///
    /// Nothing is sent to the driver until the stream is subscribed to.
    pub fn find(&self, filter: Option<C::Filter>) -> FindStream<C> {
        CursorStream::new(FindSource {
            collection: Arc::clone(&self.collection),
            filter,
        })
    }

    pub fn find_one_and_delete(&self, filter: C::Filter) -> Deferred<Option<C::Document>> {
        self.defer(move |c, cb| c.find_one_and_delete(filter, cb))
    }

    pub fn find_one_and_replace(
        &self,
        filter: C::Filter,
        replacement: C::Document,
    ) -> Deferred<Option<C::Document>> {
        self.defer(move |c, cb| c.find_one_and_replace(filter, replacement, cb))
    }

    pub fn find_one_and_update(
        &self,
        filter: C::Filter,
        update: C::Update,
    ) -> Deferred<Option<C::Document>> {
        self.defer(move |c, cb| c.find_one_and_update(filter, update, cb))
    }

    /// Resolves to `true` once the driver acknowledges the insert.
    pub fn insert_one(&self, document: C::Document) -> Deferred<bool> {
        let collection = Arc::clone(&self.collection);
        Deferred::completion(move |cb| collection.insert_one(document, cb))
    }

    /// Resolves to `true` once the driver acknowledges the insert.
    pub fn insert_many(&self, documents: Vec<C::Document>) -> Deferred<bool> {
        let collection = Arc::clone(&self.collection);
        Deferred::completion(move |cb| collection.insert_many(documents, cb))
    }

    pub fn replace_one(
        &self,
        filter: C::Filter,
        replacement: C::Document,
    ) -> Deferred<C::UpdateResult> {
        self.defer(move |c, cb| c.replace_one(filter, replacement, cb))
    }

    pub fn update_one(&self, filter: C::Filter, update: C::Update) -> Deferred<C::UpdateResult> {
        self.defer(move |c, cb| c.update_one(filter, update, cb))
    }

    pub fn update_many(&self, filter: C::Filter, update: C::Update) -> Deferred<C::UpdateResult> {
        self.defer(move |c, cb| c.update_many(filter, update, cb))
    }
}

impl<C: AsyncCollection> std::fmt::Debug for ReactiveCollection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveCollection")
            .field("namespace", &self.namespace())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FindSource
// ---------------------------------------------------------------------------

/// Cursor source that re-issues the same `find` for each subscription.
pub struct FindSource<C: AsyncCollection> {
    collection: Arc<C>,
    filter: Option<C::Filter>,
}

impl<C: AsyncCollection> FindSource<C> {
    #[must_use]
    pub fn filter(&self) -> Option<&C::Filter> {
        self.filter.as_ref()
    }
}

impl<C: AsyncCollection> CursorSource for FindSource<C> {
    type Cursor = C::Cursor;

    fn open(&self, callback: Callback<Self::Cursor>) {
        self.collection.find(self.filter.clone(), callback);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
