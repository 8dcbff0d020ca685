//! Completion handle passed to callback-driven providers.
//!
//! A [`Callback`] wraps the continuation of a single asynchronous call. It is
//! consumed when invoked, so a provider can report at most one result. If a
//! provider drops the handle without invoking it, the continuation still runs
//! once with a [`CallbackDropped`] error, so consumers are never left waiting
//! on a result that can no longer arrive.

use std::fmt;

/// Error reported to a continuation whose [`Callback`] was dropped unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("callback dropped before a result was delivered")]
pub struct CallbackDropped;

type Continuation<T> = Box<dyn FnOnce(anyhow::Result<T>) + Send>;

/// One-shot completion handle for an asynchronous provider call.
///
/// Providers call [`Callback::call`] (or [`success`](Callback::success) /
/// [`failure`](Callback::failure)) from whatever thread completes the work,
/// possibly synchronously from inside the call that received the handle.
pub struct Callback<T> {
    continuation: Option<Continuation<T>>,
}

impl<T> Callback<T> {
    /// Wraps a continuation that receives the provider's result.
    pub fn new<F>(continuation: F) -> Self
    where
        F: FnOnce(anyhow::Result<T>) + Send + 'static,
    {
        Self {
            continuation: Some(Box::new(continuation)),
        }
    }

    /// Delivers `result` to the continuation.
    pub fn call(mut self, result: anyhow::Result<T>) {
        if let Some(continuation) = self.continuation.take() {
            continuation(result);
        }
    }

    /// Delivers a successful result.
    pub fn success(self, value: T) {
        self.call(Ok(value));
    }

    /// Delivers a failure.
    pub fn failure(self, error: impl Into<anyhow::Error>) {
        self.call(Err(error.into()));
    }
}

impl<T> Drop for Callback<T> {
    fn drop(&mut self) {
        if let Some(continuation) = self.continuation.take() {
            tracing::trace!("callback dropped without a result");
            continuation(Err(anyhow::Error::new(CallbackDropped)));
        }
    }
}

impl<T> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("pending", &self.continuation.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn call_delivers_value_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = Callback::new(move |result: anyhow::Result<u32>| {
            sink.lock().unwrap().push(result.unwrap());
        });

        callback.success(7);

        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn failure_is_passed_through() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let callback = Callback::new(move |result: anyhow::Result<u32>| {
            *sink.lock().unwrap() = Some(result.unwrap_err().to_string());
        });

        callback.failure(anyhow::anyhow!("server gone"));

        assert_eq!(seen.lock().unwrap().as_deref(), Some("server gone"));
    }

    #[test]
    fn drop_reports_callback_dropped() {
        let calls = Arc::new(AtomicU32::new(0));
        let dropped = Arc::new(AtomicU32::new(0));
        let (c, d) = (Arc::clone(&calls), Arc::clone(&dropped));
        let callback = Callback::new(move |result: anyhow::Result<()>| {
            c.fetch_add(1, Ordering::SeqCst);
            if result.unwrap_err().is::<CallbackDropped>() {
                d.fetch_add(1, Ordering::SeqCst);
            }
        });

        drop(callback);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invoked_callback_does_not_fire_again_on_drop() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let callback = Callback::new(move |_result: anyhow::Result<()>| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        callback.success(());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_shows_pending_flag() {
        let callback = Callback::new(|_result: anyhow::Result<()>| {});
        assert_eq!(format!("{callback:?}"), "Callback { pending: true }");
        callback.success(());
    }
}
