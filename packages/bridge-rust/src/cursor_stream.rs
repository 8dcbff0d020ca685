//! Push stream over a paginated cursor.
//!
//! [`CursorStreamBridge`] drains a [`PaginatedCursor`] into a single
//! subscriber, sizing each fetch from the subscriber's outstanding demand.
//!
//! # Drain loop
//!
//! All work (fetching, emitting, closing) happens inside one drain loop
//! guarded by a work-in-progress counter. Fetch callbacks, `request` and
//! `cancel` only record their effect and bump the counter; whichever thread
//! takes the counter from zero runs the loop until no work is missed. A
//! cursor that completes synchronously from inside `fetch_next` therefore
//! hands control back to the loop instead of recursing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rongo_core::{
    BatchSizePolicy, BridgeError, Callback, InertSubscription, PaginatedCursor, Publisher,
    Subscriber, Subscription,
};
use tracing::{debug, trace, warn};

/// Lifecycle of a [`CursorStreamBridge`].
///
/// State machine: Unattached -> Active -> {Cancelled, Completed, Failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BridgeState {
    /// No subscriber yet; the cursor is untouched.
    Unattached = 0,
    /// A subscriber is attached and batches are being fetched.
    Active = 1,
    /// The subscriber cancelled; the cursor is closed.
    Cancelled = 2,
    /// The cursor was exhausted and completion delivered.
    Completed = 3,
    /// A fetch failed and the error was delivered.
    Failed = 4,
}

impl BridgeState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Unattached,
            1 => Self::Active,
            2 => Self::Cancelled,
            3 => Self::Completed,
            _ => Self::Failed,
        }
    }

    /// Whether no further signals or fetches can happen.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// CursorStreamBridge
// ---------------------------------------------------------------------------

/// Single-subscriber push stream over a paginated cursor.
///
/// The first subscriber drains the cursor. Any later subscriber receives an
/// inert subscription and an immediate `on_complete` with no items.
pub struct CursorStreamBridge<C: PaginatedCursor> {
    bridge: Arc<Bridge<C>>,
}

impl<C: PaginatedCursor> CursorStreamBridge<C> {
    /// Wraps `cursor` with the default batch-size policy.
    #[must_use]
    pub fn new(cursor: C) -> Self {
        Self::with_policy(cursor, BatchSizePolicy::default())
    }

    /// Wraps `cursor`, sizing fetches with `policy`.
    #[must_use]
    pub fn with_policy(cursor: C, policy: BatchSizePolicy) -> Self {
        Self {
            bridge: Arc::new(Bridge {
                policy,
                attached: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                state: AtomicU8::new(BridgeState::Unattached as u8),
                requested: AtomicU64::new(0),
                wip: AtomicUsize::new(0),
                fetched: Mutex::new(None),
                core: Mutex::new(Core {
                    cursor: Some(cursor),
                    subscriber: None,
                    announced: false,
                    held: VecDeque::new(),
                    in_flight: false,
                    terminal: None,
                }),
            }),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.bridge.state()
    }

    /// Attaches `subscriber` and starts draining the cursor.
    ///
    /// Only the first call attaches; later calls complete their subscriber
    /// immediately with zero items.
    pub fn attach(&self, mut subscriber: Box<dyn Subscriber<C::Item>>) {
        if self
            .bridge
            .attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("cursor stream already attached; completing extra subscriber");
            subscriber.on_subscribe(Arc::new(InertSubscription));
            subscriber.on_complete();
            return;
        }

        debug!("subscriber attached to cursor stream");
        self.bridge.core.lock().subscriber = Some(subscriber);
        self.bridge.set_state(BridgeState::Active);
        self.bridge.drain();
    }
}

impl<C: PaginatedCursor> Publisher<C::Item> for CursorStreamBridge<C> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<C::Item>>) {
        self.attach(subscriber);
    }
}

impl<C: PaginatedCursor> std::fmt::Debug for CursorStreamBridge<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorStreamBridge")
            .field("state", &self.state())
            .field("policy", &self.bridge.policy)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Bridge internals
// ---------------------------------------------------------------------------

type FetchResult<T> = anyhow::Result<Option<Vec<T>>>;

enum Terminal {
    Complete,
    Error(BridgeError),
}

struct Bridge<C: PaginatedCursor> {
    policy: BatchSizePolicy,
    /// First-attach-wins flag.
    attached: AtomicBool,
    /// Set once by `cancel`; observed by the drain loop.
    cancelled: AtomicBool,
    state: AtomicU8,
    /// Outstanding demand. `u64::MAX` is unbounded and never decremented.
    requested: AtomicU64,
    wip: AtomicUsize,
    /// Result slot written by fetch callbacks. Separate from `core` so a
    /// callback running inside `fetch_next` never needs the drainer's lock.
    fetched: Mutex<Option<FetchResult<C::Item>>>,
    /// Only locked by the thread currently running the drain loop.
    core: Mutex<Core<C>>,
}

struct Core<C: PaginatedCursor> {
    /// `None` once closed.
    cursor: Option<C>,
    subscriber: Option<Box<dyn Subscriber<C::Item>>>,
    /// Whether `on_subscribe` has been delivered.
    announced: bool,
    /// Items fetched but not yet covered by demand.
    held: VecDeque<C::Item>,
    in_flight: bool,
    /// Terminal signal waiting for `held` to drain.
    terminal: Option<Terminal>,
}

impl<C: PaginatedCursor> Core<C> {
    fn close_cursor(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
    }
}

impl<C: PaginatedCursor> Drop for Core<C> {
    fn drop(&mut self) {
        // A bridge dropped before reaching a terminal state still releases
        // the server-side cursor.
        self.close_cursor();
    }
}

impl<C: PaginatedCursor> Bridge<C> {
    fn state(&self) -> BridgeState {
        BridgeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: BridgeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn add_demand(&self, n: u64) {
        let _ = self
            .requested
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(n))
            });
    }

    /// Consumes one unit of demand, returning `false` if none is outstanding.
    fn take_demand(&self) -> bool {
        self.requested
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match current {
                0 => None,
                u64::MAX => Some(u64::MAX),
                n => Some(n - 1),
            })
            .is_ok()
    }

    fn on_fetched(self: &Arc<Self>, result: FetchResult<C::Item>) {
        *self.fetched.lock() = Some(result);
        self.drain();
    }

    fn drain(self: &Arc<Self>) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            self.drain_once();
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn drain_once(self: &Arc<Self>) {
        let mut core = self.core.lock();

        if self.state() != BridgeState::Active {
            // A fetch that lands after a terminal state is discarded.
            let late = self.fetched.lock().take();
            drop(late);
            return;
        }

        if !core.announced {
            core.announced = true;
            let subscription: Arc<dyn Subscription> = Arc::new(BridgeSubscription {
                bridge: Arc::clone(self),
            });
            if let Some(subscriber) = core.subscriber.as_mut() {
                subscriber.on_subscribe(subscription);
            }
        }

        if self.cancelled.load(Ordering::Acquire) {
            self.cancel_now(&mut core);
            return;
        }

        let fetched = self.fetched.lock().take();
        if let Some(result) = fetched {
            core.in_flight = false;
            Self::absorb(&mut core, result);
        }

        self.emit_held(&mut core);

        if self.cancelled.load(Ordering::Acquire) {
            self.cancel_now(&mut core);
            return;
        }
        if !core.held.is_empty() {
            // Waiting for demand.
            return;
        }
        if let Some(terminal) = core.terminal.take() {
            self.finish(&mut core, terminal);
            return;
        }
        if !core.in_flight {
            self.request_batch(&mut core);
        }
    }

    fn absorb(core: &mut Core<C>, result: FetchResult<C::Item>) {
        match result {
            Err(error) => {
                warn!(error = %error, "cursor fetch failed");
                core.close_cursor();
                core.terminal = Some(Terminal::Error(BridgeError::CursorFetch(error)));
            }
            Ok(Some(items)) if !items.is_empty() => {
                trace!(count = items.len(), "batch received");
                core.held.extend(items);
            }
            Ok(_) => {
                debug!("cursor exhausted");
                core.close_cursor();
                core.terminal = Some(Terminal::Complete);
            }
        }
    }

    fn emit_held(&self, core: &mut Core<C>) {
        while !core.held.is_empty() {
            if self.cancelled.load(Ordering::Acquire) || !self.take_demand() {
                return;
            }
            let Some(item) = core.held.pop_front() else {
                return;
            };
            if let Some(subscriber) = core.subscriber.as_mut() {
                subscriber.on_next(item);
            }
        }
    }

    fn request_batch(self: &Arc<Self>, core: &mut Core<C>) {
        let Some(cursor) = core.cursor.as_mut() else {
            return;
        };
        // Demand is sampled now, between batches, not at subscribe time.
        let demand = self.requested.load(Ordering::Acquire);
        let batch_size = self.policy.clamp(demand);
        debug!(demand, batch_size, "requesting next batch");

        core.in_flight = true;
        cursor.set_batch_size(batch_size);
        let bridge = Arc::clone(self);
        cursor.fetch_next(Callback::new(move |result| bridge.on_fetched(result)));
    }

    fn finish(&self, core: &mut Core<C>, terminal: Terminal) {
        core.close_cursor();
        let subscriber = core.subscriber.take();
        match terminal {
            Terminal::Complete => {
                self.set_state(BridgeState::Completed);
                if let Some(mut subscriber) = subscriber {
                    subscriber.on_complete();
                }
            }
            Terminal::Error(error) => {
                self.set_state(BridgeState::Failed);
                if let Some(mut subscriber) = subscriber {
                    subscriber.on_error(error);
                }
            }
        }
    }

    fn cancel_now(&self, core: &mut Core<C>) {
        debug!(held = core.held.len(), "cursor stream cancelled");
        self.set_state(BridgeState::Cancelled);
        core.close_cursor();
        core.held.clear();
        core.terminal = None;
        core.subscriber = None;
    }
}

// ---------------------------------------------------------------------------
// BridgeSubscription
// ---------------------------------------------------------------------------

struct BridgeSubscription<C: PaginatedCursor> {
    bridge: Arc<Bridge<C>>,
}

impl<C: PaginatedCursor> Subscription for BridgeSubscription<C> {
    fn request(&self, n: u64) {
        if n == 0 {
            return;
        }
        self.bridge.add_demand(n);
        self.bridge.drain();
    }

    fn cancel(&self) {
        if !self.bridge.cancelled.swap(true, Ordering::AcqRel) {
            self.bridge.drain();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
