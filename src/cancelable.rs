//! Disposal handles for subscriptions
//!
//! A `Cancelable` runs its cancel callback at most once, no matter how many
//! clones call `cancel()` or whether the underlying activity already ended.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type CancelFn = Box<dyn FnOnce() + Send>;

struct CancelInner {
    canceled: AtomicBool,
    callback: Mutex<Option<CancelFn>>,
}

/// Idempotent cancellation token
#[derive(Clone)]
pub struct Cancelable {
    inner: Option<Arc<CancelInner>>,
}

impl Cancelable {
    /// Create a handle that runs `on_cancel` the first time it is canceled
    pub fn new(on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Some(Arc::new(CancelInner {
                canceled: AtomicBool::new(false),
                callback: Mutex::new(Some(Box::new(on_cancel))),
            })),
        }
    }

    /// Already-completed sentinel; canceling it does nothing
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Cancel the underlying activity; safe to call repeatedly
    pub fn cancel(&self) {
        let Some(inner) = &self.inner else {
            return;
        };
        if inner.canceled.swap(true, Ordering::AcqRel) {
            return;
        }
        let callback = inner
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Whether `cancel()` has been called on this handle or a clone
    pub fn is_canceled(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.canceled.load(Ordering::Acquire))
    }

    /// Whether two handles refer to the same subscription
    pub fn same_as(&self, other: &Cancelable) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Default for Cancelable {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Cancelable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancelable")
            .field("empty", &self.inner.is_none())
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancel_runs_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = Cancelable::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let clone = handle.clone();

        assert!(!handle.is_canceled());
        handle.cancel();
        handle.cancel();
        clone.cancel();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clone.is_canceled());
        assert!(handle.same_as(&clone));
    }

    #[test]
    fn test_empty_is_noop() {
        let handle = Cancelable::empty();
        handle.cancel();
        assert!(!handle.is_canceled());
        assert!(handle.same_as(&Cancelable::default()));
    }

    #[test]
    fn test_distinct_handles() {
        let a = Cancelable::new(|| {});
        let b = Cancelable::new(|| {});
        assert!(!a.same_as(&b));
        assert!(!a.same_as(&Cancelable::empty()));
    }
}
