//! `futures` adapters for push streams.
//!
//! [`ItemStream`] turns any [`Publisher`] into a pull-based
//! [`Stream`](futures_util::Stream). Demand is signalled in chunks: the
//! configured prefetch up front, then the refill threshold each time that many
//! items have been consumed, so the publisher never runs more than one
//! prefetch ahead of the consumer.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures_util::stream::TryCollect;
use futures_util::{Stream, TryStreamExt};
use parking_lot::Mutex;
use rongo_core::{BridgeError, Publisher, Subscriber, Subscription};
use tokio::sync::mpsc;

use crate::config::StreamConfig;

enum Signal<T> {
    Next(T),
    Error(BridgeError),
    Complete,
}

/// Subscription shared by both ends of an [`ItemStream`]. Filled from
/// `on_subscribe`, so it is reachable before the stream is first polled.
type SubscriptionSlot = Arc<Mutex<Option<Arc<dyn Subscription>>>>;

fn cancel_slot(slot: &SubscriptionSlot) {
    let subscription = slot.lock().take();
    if let Some(subscription) = subscription {
        subscription.cancel();
    }
}

// ---------------------------------------------------------------------------
// ChannelSubscriber
// ---------------------------------------------------------------------------

/// Subscriber end that forwards every signal into the stream's channel.
struct ChannelSubscriber<T> {
    tx: mpsc::UnboundedSender<Signal<T>>,
    prefetch: u64,
    slot: SubscriptionSlot,
}

impl<T> ChannelSubscriber<T> {
    fn forward(&mut self, signal: Signal<T>) {
        if self.tx.send(signal).is_err() {
            // The stream was dropped; stop the publisher.
            cancel_slot(&self.slot);
        }
    }
}

impl<T: Send + 'static> Subscriber<T> for ChannelSubscriber<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        if self.tx.is_closed() {
            // Stream dropped while the publisher was still acquiring.
            subscription.cancel();
            return;
        }
        *self.slot.lock() = Some(Arc::clone(&subscription));
        subscription.request(self.prefetch);
    }

    fn on_next(&mut self, item: T) {
        self.forward(Signal::Next(item));
    }

    fn on_error(&mut self, error: BridgeError) {
        let _ = self.tx.send(Signal::Error(error));
    }

    fn on_complete(&mut self) {
        let _ = self.tx.send(Signal::Complete);
    }
}

// ---------------------------------------------------------------------------
// ItemStream
// ---------------------------------------------------------------------------

/// Pull-based view of a push stream.
///
/// Yields `Ok(item)` for each item and a final `Err` if the stream failed.
/// Dropping the stream before it ends cancels the subscription, whether or
/// not it was ever polled.
pub struct ItemStream<T> {
    rx: mpsc::UnboundedReceiver<Signal<T>>,
    slot: SubscriptionSlot,
    refill_threshold: u64,
    consumed: u64,
    done: bool,
}

impl<T: Send + 'static> ItemStream<T> {
    /// Subscribes to `publisher`, requesting demand as configured.
    pub fn subscribe<P>(publisher: &P, config: StreamConfig) -> Self
    where
        P: Publisher<T> + ?Sized,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let slot: SubscriptionSlot = Arc::new(Mutex::new(None));
        publisher.subscribe(Box::new(ChannelSubscriber {
            tx,
            prefetch: config.prefetch,
            slot: Arc::clone(&slot),
        }));
        Self {
            rx,
            slot,
            refill_threshold: config.refill_threshold(),
            consumed: 0,
            done: false,
        }
    }

    fn item_consumed(&mut self) {
        self.consumed += 1;
        if self.consumed == self.refill_threshold {
            self.consumed = 0;
            let subscription = self.slot.lock().clone();
            if let Some(subscription) = subscription {
                subscription.request(self.refill_threshold);
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.slot.lock().take();
    }
}

impl<T: Send + 'static> Stream for ItemStream<T> {
    type Item = Result<T, BridgeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match ready!(this.rx.poll_recv(cx)) {
            Some(Signal::Next(item)) => {
                this.item_consumed();
                Poll::Ready(Some(Ok(item)))
            }
            Some(Signal::Error(error)) => {
                this.finish();
                Poll::Ready(Some(Err(error)))
            }
            Some(Signal::Complete) | None => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }
}

impl<T> Drop for ItemStream<T> {
    fn drop(&mut self) {
        if !self.done {
            cancel_slot(&self.slot);
        }
    }
}

// ---------------------------------------------------------------------------
// PublisherExt
// ---------------------------------------------------------------------------

/// Async conveniences for any [`Publisher`].
pub trait PublisherExt<T: Send + 'static>: Publisher<T> {
    /// Subscribes and returns a pull-based stream.
    fn into_stream(&self, config: StreamConfig) -> ItemStream<T> {
        ItemStream::subscribe(self, config)
    }

    /// Subscribes with unbounded demand and collects every item.
    fn collect_all(&self) -> TryCollect<ItemStream<T>, Vec<T>> {
        self.into_stream(StreamConfig::unbounded()).try_collect()
    }
}

impl<T: Send + 'static, P: Publisher<T> + ?Sized> PublisherExt<T> for P {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
