//! Recording subscriber shared by the unit tests.

use std::sync::Arc;

use parking_lot::Mutex;
use rongo_core::{BridgeError, Subscriber, Subscription};

/// Signal observed by a [`Recorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T> {
    Subscribed,
    Next(T),
    Error(String),
    Complete,
}

struct Shared<T> {
    events: Vec<Event<T>>,
    errors: Vec<BridgeError>,
    subscription: Option<Arc<dyn Subscription>>,
}

/// Test handle over a recording subscriber. Clones share the same log.
pub struct Recorder<T> {
    shared: Arc<Mutex<Shared<T>>>,
    initial_request: u64,
    cancel_after: Option<usize>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            initial_request: self.initial_request,
            cancel_after: self.cancel_after,
        }
    }
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn unbounded() -> Self {
        Self::requesting(u64::MAX)
    }

    /// Requests `n` items from `on_subscribe` (nothing when `n` is zero).
    pub fn requesting(n: u64) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                events: Vec::new(),
                errors: Vec::new(),
                subscription: None,
            })),
            initial_request: n,
            cancel_after: None,
        }
    }

    /// Cancels from inside `on_next` once `n` items have arrived.
    pub fn cancel_after(mut self, n: usize) -> Self {
        self.cancel_after = Some(n);
        self
    }

    pub fn subscriber(&self) -> Box<dyn Subscriber<T>> {
        Box::new(RecordingSubscriber {
            shared: Arc::clone(&self.shared),
            initial_request: self.initial_request,
            cancel_after: self.cancel_after,
            seen: 0,
        })
    }

    pub fn events(&self) -> Vec<Event<T>> {
        self.shared.lock().events.clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.shared
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                Event::Next(item) => Some(item.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn completed(&self) -> bool {
        self.shared
            .lock()
            .events
            .iter()
            .any(|event| matches!(event, Event::Complete))
    }

    pub fn failed(&self) -> bool {
        self.shared
            .lock()
            .events
            .iter()
            .any(|event| matches!(event, Event::Error(_)))
    }

    pub fn terminal_count(&self) -> usize {
        self.shared
            .lock()
            .events
            .iter()
            .filter(|event| matches!(event, Event::Complete | Event::Error(_)))
            .count()
    }

    pub fn take_errors(&self) -> Vec<BridgeError> {
        std::mem::take(&mut self.shared.lock().errors)
    }

    pub fn request(&self, n: u64) {
        let subscription = self.shared.lock().subscription.clone();
        if let Some(subscription) = subscription {
            subscription.request(n);
        }
    }

    pub fn cancel(&self) {
        let subscription = self.shared.lock().subscription.clone();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}

struct RecordingSubscriber<T> {
    shared: Arc<Mutex<Shared<T>>>,
    initial_request: u64,
    cancel_after: Option<usize>,
    seen: usize,
}

impl<T: Send + 'static> Subscriber<T> for RecordingSubscriber<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        {
            let mut shared = self.shared.lock();
            shared.events.push(Event::Subscribed);
            shared.subscription = Some(Arc::clone(&subscription));
        }
        if self.initial_request > 0 {
            subscription.request(self.initial_request);
        }
    }

    fn on_next(&mut self, item: T) {
        self.shared.lock().events.push(Event::Next(item));
        self.seen += 1;
        if self.cancel_after == Some(self.seen) {
            let subscription = self.shared.lock().subscription.clone();
            if let Some(subscription) = subscription {
                subscription.cancel();
            }
        }
    }

    fn on_error(&mut self, error: BridgeError) {
        let mut shared = self.shared.lock();
        shared.events.push(Event::Error(error.to_string()));
        shared.errors.push(error);
    }

    fn on_complete(&mut self) {
        self.shared.lock().events.push(Event::Complete);
    }
}
