//! In-memory cursor providers.
//!
//! [`VecCursor`] and [`VecSource`] serve a vector in batches and complete
//! every fetch synchronously. [`ScriptedCursor`] replays a fixed sequence of
//! fetch outcomes, including fetches that stay pending until released through
//! a [`ParkedFetch`] handle. All of them report their calls to a shared
//! [`CursorProbe`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rongo_core::{Callback, CursorSource, FetchCallback, PaginatedCursor};

/// Batch size used when a fetch is issued before any hint was set.
pub const DEFAULT_SERVER_BATCH_SIZE: u32 = 101;

// ---------------------------------------------------------------------------
// CursorProbe
// ---------------------------------------------------------------------------

/// Shared counters describing how a cursor was driven.
#[derive(Debug, Clone, Default)]
pub struct CursorProbe {
    inner: Arc<ProbeInner>,
}

#[derive(Debug, Default)]
struct ProbeInner {
    fetches: AtomicU64,
    closes: AtomicU64,
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
    fetches_after_close: AtomicU64,
    batch_sizes: Mutex<Vec<u32>>,
}

impl CursorProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `fetch_next` calls.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Number of `close` calls.
    #[must_use]
    pub fn close_count(&self) -> u64 {
        self.inner.closes.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously outstanding fetches observed.
    #[must_use]
    pub fn max_in_flight(&self) -> u64 {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    /// Fetches issued after the cursor was closed.
    #[must_use]
    pub fn fetches_after_close(&self) -> u64 {
        self.inner.fetches_after_close.load(Ordering::SeqCst)
    }

    /// Batch-size hint in effect at each fetch, in call order.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<u32> {
        self.inner.batch_sizes.lock().clone()
    }

    fn begin_fetch(&self, batch_size: u32, closed: bool) {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        if closed {
            self.inner.fetches_after_close.fetch_add(1, Ordering::SeqCst);
        }
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.inner.batch_sizes.lock().push(batch_size);
    }

    fn record_close(&self) {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
    }

    /// Wraps `callback` so the fetch counts as finished before the result is
    /// delivered (the continuation may issue the next fetch).
    fn track<T: Send + 'static>(&self, callback: FetchCallback<T>) -> FetchCallback<T> {
        let probe = self.clone();
        Callback::new(move |result| {
            probe.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
            callback.call(result);
        })
    }
}

// ---------------------------------------------------------------------------
// VecCursor
// ---------------------------------------------------------------------------

/// Cursor over an in-memory vector, answering each fetch synchronously with
/// up to the current batch-size hint.
#[derive(Debug)]
pub struct VecCursor<T> {
    remaining: VecDeque<T>,
    batch_size: u32,
    closed: bool,
    fail_at_fetch: Option<u64>,
    fetches: u64,
    probe: CursorProbe,
}

impl<T: Send + 'static> VecCursor<T> {
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self::with_probe(items, CursorProbe::new())
    }

    #[must_use]
    pub fn with_probe(items: Vec<T>, probe: CursorProbe) -> Self {
        Self {
            remaining: items.into(),
            batch_size: 0,
            closed: false,
            fail_at_fetch: None,
            fetches: 0,
            probe,
        }
    }

    /// Fail the `fetch_number`-th fetch (1-based) instead of returning items.
    #[must_use]
    pub fn failing_at(mut self, fetch_number: u64) -> Self {
        self.fail_at_fetch = Some(fetch_number);
        self
    }

    #[must_use]
    pub fn probe(&self) -> CursorProbe {
        self.probe.clone()
    }
}

impl<T: Send + 'static> PaginatedCursor for VecCursor<T> {
    type Item = T;

    fn set_batch_size(&mut self, batch_size: u32) {
        self.batch_size = batch_size;
    }

    fn fetch_next(&mut self, callback: FetchCallback<T>) {
        let size = if self.batch_size == 0 {
            DEFAULT_SERVER_BATCH_SIZE
        } else {
            self.batch_size
        };
        self.probe.begin_fetch(size, self.closed);
        let callback = self.probe.track(callback);
        self.fetches += 1;

        if self.fail_at_fetch == Some(self.fetches) {
            callback.failure(anyhow::anyhow!(
                "simulated cursor failure on fetch {}",
                self.fetches
            ));
            return;
        }
        if self.closed || self.remaining.is_empty() {
            callback.success(None);
            return;
        }
        let take = self.remaining.len().min(size as usize);
        let batch: Vec<T> = self.remaining.drain(..take).collect();
        callback.success(Some(batch));
    }

    fn close(&mut self) {
        self.probe.record_close();
        self.closed = true;
        self.remaining.clear();
    }
}

// ---------------------------------------------------------------------------
// VecSource
// ---------------------------------------------------------------------------

/// Query descriptor that opens a fresh [`VecCursor`] over a copy of `items`
/// for every subscription.
#[derive(Debug)]
pub struct VecSource<T> {
    items: Vec<T>,
    probe: CursorProbe,
    open_error: Option<String>,
    fail_at_fetch: Option<u64>,
    opens: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> VecSource<T> {
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            probe: CursorProbe::new(),
            open_error: None,
            fail_at_fetch: None,
            opens: AtomicU64::new(0),
        }
    }

    /// Make every `open` fail with `message`.
    #[must_use]
    pub fn failing_open(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    /// Make opened cursors fail their `fetch_number`-th fetch.
    #[must_use]
    pub fn failing_fetch_at(mut self, fetch_number: u64) -> Self {
        self.fail_at_fetch = Some(fetch_number);
        self
    }

    /// Probe shared by every cursor this source opens.
    #[must_use]
    pub fn probe(&self) -> CursorProbe {
        self.probe.clone()
    }

    /// Number of `open` calls.
    #[must_use]
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }
}

impl<T: Clone + Send + Sync + 'static> CursorSource for VecSource<T> {
    type Cursor = VecCursor<T>;

    fn open(&self, callback: Callback<VecCursor<T>>) {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.open_error {
            callback.failure(anyhow::anyhow!("{message}"));
            return;
        }
        let mut cursor = VecCursor::with_probe(self.items.clone(), self.probe.clone());
        cursor.fail_at_fetch = self.fail_at_fetch;
        callback.success(cursor);
    }
}

// ---------------------------------------------------------------------------
// ScriptedCursor
// ---------------------------------------------------------------------------

/// Outcome of one scripted fetch.
#[derive(Debug)]
pub enum Step<T> {
    /// Complete with this batch.
    Batch(Vec<T>),
    /// Complete with the end-of-cursor marker.
    End,
    /// Fail with this error.
    Fail(anyhow::Error),
    /// Keep the fetch pending until released through [`ParkedFetch`].
    Park,
    /// Drop the callback without invoking it.
    Drop,
}

impl<T> Step<T> {
    /// Shorthand for [`Step::Fail`] with a message.
    #[must_use]
    pub fn fail(message: &str) -> Self {
        Self::Fail(anyhow::anyhow!("{message}"))
    }
}

/// Cursor that replays a fixed list of fetch outcomes. Fetches past the end
/// of the script report end-of-cursor.
#[derive(Debug)]
pub struct ScriptedCursor<T> {
    steps: VecDeque<Step<T>>,
    batch_size: u32,
    closed: bool,
    parked: ParkedFetch<T>,
    probe: CursorProbe,
}

impl<T: Send + 'static> ScriptedCursor<T> {
    #[must_use]
    pub fn new(steps: Vec<Step<T>>) -> Self {
        Self {
            steps: steps.into(),
            batch_size: DEFAULT_SERVER_BATCH_SIZE,
            closed: false,
            parked: ParkedFetch {
                slot: Arc::new(Mutex::new(None)),
            },
            probe: CursorProbe::new(),
        }
    }

    #[must_use]
    pub fn probe(&self) -> CursorProbe {
        self.probe.clone()
    }

    /// Handle for releasing fetches scripted as [`Step::Park`].
    #[must_use]
    pub fn parked(&self) -> ParkedFetch<T> {
        self.parked.clone()
    }
}

impl<T: Send + 'static> PaginatedCursor for ScriptedCursor<T> {
    type Item = T;

    fn set_batch_size(&mut self, batch_size: u32) {
        self.batch_size = batch_size;
    }

    fn fetch_next(&mut self, callback: FetchCallback<T>) {
        self.probe.begin_fetch(self.batch_size, self.closed);
        let callback = self.probe.track(callback);
        match self.steps.pop_front() {
            Some(Step::Batch(items)) => callback.success(Some(items)),
            Some(Step::End) | None => callback.success(None),
            Some(Step::Fail(error)) => callback.failure(error),
            Some(Step::Park) => {
                let displaced = self.parked.slot.lock().replace(callback);
                drop(displaced);
            }
            Some(Step::Drop) => drop(callback),
        }
    }

    fn close(&mut self) {
        self.probe.record_close();
        self.closed = true;
    }
}

/// Releases a fetch parked by a [`ScriptedCursor`].
#[derive(Debug)]
pub struct ParkedFetch<T> {
    slot: Arc<Mutex<Option<FetchCallback<T>>>>,
}

impl<T> Clone for ParkedFetch<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> ParkedFetch<T> {
    /// Completes the parked fetch with `result`. Returns `false` if no fetch
    /// was parked.
    pub fn resolve(&self, result: anyhow::Result<Option<Vec<T>>>) -> bool {
        let callback = self.slot.lock().take();
        match callback {
            Some(callback) => {
                callback.call(result);
                true
            }
            None => false,
        }
    }

    /// Whether a fetch is currently parked.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}
