//! Deferred values over single-result callback operations.
//!
//! A [`Deferred`] holds an operation that has not started yet. The operation
//! runs exactly once, when the deferred is subscribed to or first polled as a
//! future, and its one outcome is delivered to the consumer.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;

use rongo_core::{BridgeError, Callback, CallbackDropped, SingleResultOperation};
use tokio::sync::oneshot;

type Start<T> = Box<dyn FnOnce(Callback<T>) + Send>;

/// Lazily started, exactly-once-resolved result of an asynchronous operation.
///
/// Nothing happens until [`subscribe`](Deferred::subscribe),
/// [`on_result`](Deferred::on_result) or `.await`. If the operation never
/// calls back, the deferred never resolves; no timeout is imposed here.
#[must_use = "a deferred does nothing until it is subscribed to or awaited"]
pub struct Deferred<T> {
    start: Start<T>,
}

impl<T: Send + 'static> Deferred<T> {
    /// Wraps a callback-style operation. `start` is not invoked here.
    pub fn new<F>(start: F) -> Self
    where
        F: FnOnce(Callback<T>) + Send + 'static,
    {
        Self {
            start: Box::new(start),
        }
    }

    /// Wraps a [`SingleResultOperation`].
    pub fn from_operation<O>(operation: O) -> Self
    where
        O: SingleResultOperation<T>,
    {
        Self::new(move |callback| operation.start(callback))
    }

    /// A deferred that resolves to `value` when subscribed.
    pub fn ready(value: T) -> Self {
        Self::new(move |callback| callback.success(value))
    }

    /// Starts the operation and hands its outcome to `handler`.
    pub fn on_result<F>(self, handler: F)
    where
        F: FnOnce(Result<T, BridgeError>) + Send + 'static,
    {
        let callback = Callback::new(move |result: anyhow::Result<T>| {
            handler(result.map_err(BridgeError::operation));
        });
        (self.start)(callback);
    }

    /// Starts the operation, routing success and failure to separate handlers.
    pub fn subscribe<S, E>(self, on_success: S, on_error: E)
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(BridgeError) + Send + 'static,
    {
        self.on_result(move |result| match result {
            Ok(value) => on_success(value),
            Err(error) => on_error(error),
        });
    }

    /// Transforms the success value once it arrives.
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let start = self.start;
        Deferred::new(move |callback: Callback<U>| {
            start(Callback::new(move |result: anyhow::Result<T>| {
                callback.call(result.map(f));
            }));
        })
    }
}

impl Deferred<bool> {
    /// Wraps a completion-only operation: `Ok(())` resolves to `true`, an
    /// error resolves to that error.
    pub fn completion<F>(start: F) -> Self
    where
        F: FnOnce(Callback<()>) + Send + 'static,
    {
        Deferred::<()>::new(start).map(|()| true)
    }
}

impl<T: Send + 'static> IntoFuture for Deferred<T> {
    type Output = Result<T, BridgeError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<T, BridgeError>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let (tx, rx) = oneshot::channel();
            // Runs on first poll, not when the future is created.
            (self.start)(Callback::new(move |result| {
                // Ignore send errors -- the future may have been dropped
                let _ = tx.send(result);
            }));
            match rx.await {
                Ok(result) => result.map_err(BridgeError::operation),
                Err(_closed) => Err(BridgeError::Operation(anyhow::Error::new(CallbackDropped))),
            }
        })
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    fn counting_op(
        starts: &Arc<AtomicU32>,
        outcome: Result<u64, &'static str>,
    ) -> impl FnOnce(Callback<u64>) + Send + 'static {
        let starts = Arc::clone(starts);
        move |callback| {
            starts.fetch_add(1, Ordering::SeqCst);
            match outcome {
                Ok(v) => callback.success(v),
                Err(msg) => callback.failure(anyhow::anyhow!(msg)),
            }
        }
    }

    #[test]
    fn does_not_start_before_subscribe() {
        let starts = Arc::new(AtomicU32::new(0));
        let deferred = Deferred::new(counting_op(&starts, Ok(3)));
        assert_eq!(starts.load(Ordering::SeqCst), 0);

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        deferred.subscribe(move |v| *sink.lock() = Some(v), |_| panic!("unexpected error"));

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock(), Some(3));
    }

    #[test]
    fn failure_reaches_error_handler_only() {
        let starts = Arc::new(AtomicU32::new(0));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);

        Deferred::new(counting_op(&starts, Err("write conflict"))).subscribe(
            |_| panic!("unexpected success"),
            move |e| sink.lock().push(e.to_string()),
        );

        assert_eq!(*errors.lock(), vec!["operation failed: write conflict".to_string()]);
    }

    #[test]
    fn operation_calling_back_later_resolves_later() {
        let parked: Arc<Mutex<Option<Callback<u64>>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&parked);
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        Deferred::new(move |callback| *slot.lock() = Some(callback))
            .subscribe(move |v| *sink.lock() = Some(v), |_| panic!("unexpected error"));
        assert!(seen.lock().is_none());

        let callback = parked.lock().take().unwrap();
        callback.success(42);
        assert_eq!(*seen.lock(), Some(42));
    }

    #[test]
    fn completion_maps_unit_to_true() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        Deferred::completion(|callback| callback.success(()))
            .subscribe(move |v| *sink.lock() = Some(v), |_| panic!("unexpected error"));
        assert_eq!(*seen.lock(), Some(true));
    }

    #[test]
    fn completion_forwards_error() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        Deferred::completion(|callback| callback.failure(anyhow::anyhow!("disk full")))
            .subscribe(|_| panic!("unexpected success"), move |e| {
                *sink.lock() = Some(e.into_source().to_string());
            });
        assert_eq!(seen.lock().as_deref(), Some("disk full"));
    }

    #[test]
    fn map_transforms_value() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        Deferred::ready(20)
            .map(|v: i32| v * 2 + 2)
            .on_result(move |r| *sink.lock() = Some(r.unwrap()));
        assert_eq!(*seen.lock(), Some(42));
    }

    #[test]
    fn from_operation_accepts_trait_implementors() {
        struct Ping;
        impl SingleResultOperation<&'static str> for Ping {
            fn start(self, callback: Callback<&'static str>) {
                callback.success("pong");
            }
        }

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        Deferred::from_operation(Ping).on_result(move |r| *sink.lock() = Some(r.unwrap()));
        assert_eq!(*seen.lock(), Some("pong"));
    }

    #[tokio::test]
    async fn await_is_lazy_until_polled() {
        let starts = Arc::new(AtomicU32::new(0));
        let future = Deferred::new(counting_op(&starts, Ok(9))).into_future();
        assert_eq!(starts.load(Ordering::SeqCst), 0);

        assert_eq!(future.await.unwrap(), 9);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn await_resolves_from_another_thread() {
        let deferred = Deferred::new(|callback: Callback<String>| {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                callback.success("late".to_string());
            });
        });
        assert_eq!(deferred.await.unwrap(), "late");
    }

    #[tokio::test]
    async fn await_surfaces_dropped_callback() {
        let deferred = Deferred::new(|callback: Callback<u8>| drop(callback));
        let err = deferred.await.unwrap_err();
        assert!(err.into_source().is::<CallbackDropped>());
    }

    #[tokio::test]
    async fn await_never_resolves_without_callback() {
        let parked: Arc<Mutex<Option<Callback<u8>>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&parked);
        let deferred = Deferred::new(move |callback| *slot.lock() = Some(callback));

        let outcome = tokio::time::timeout(Duration::from_millis(50), deferred.into_future()).await;
        assert!(outcome.is_err());
        assert!(parked.lock().is_some());
    }
}
